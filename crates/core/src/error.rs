//! Error types for Tearoom Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Room is at capacity")]
    RoomFull,
}

pub type Result<T> = std::result::Result<T, Error>;
