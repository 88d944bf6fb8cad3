mod draft;
mod media;
mod user;

pub use draft::*;
pub use media::*;
pub use user::*;
