//! Data models and request/response contracts shared with clients.

mod note;
mod requests;
mod user;

pub use note::NoteInfo;
pub use requests::{
    CreateNoteRequest, ErrorResponse, MeRequest, NotesResponse, SendOtpRequest, SigninRequest,
    SignupRequest, SuccessResponse, TokenResponse, UserResponse,
};
pub use user::UserInfo;
