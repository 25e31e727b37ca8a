pub mod models;
pub mod repo;

mod memory;
pub use memory::MemoryStore;

pub use models::{AuthProvider, NewNote, NewUser, Note, OAuthState, OtpChallenge, OtpMode, User};
pub use repo::{NoteStore, OAuthStateStore, OtpStore, Store, StoreError, UserStore};
