use failure::Fail;

#[derive(Debug, Fail)]
pub enum JobQueueNluError {
    #[fail(display = "Unable to read artifact '{}'", _0)]
    ArtifactUnreadable(String),
    #[fail(display = "Expected model version {} but found {}", _1, _0)]
    WrongModelVersion(String, &'static str),
    #[fail(display = "Unknown intent tag: '{}'", _0)]
    UnknownTag(String),
    #[fail(display = "Internal error: {}", _0)]
    InternalError(String),
}

pub type Result<T> = ::std::result::Result<T, ::failure::Error>;
