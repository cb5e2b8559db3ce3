use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BridgeError {
    #[snafu(display("envelope '{discriminant}' carries no payload"))]
    MissingPayload {
        stage: &'static str,
        discriminant: String,
    },
    #[snafu(display("failed to decode payload of '{discriminant}' on `{stage}`: {source}"))]
    DecodePayload {
        stage: &'static str,
        discriminant: String,
        source: serde_json::Error,
    },
    #[snafu(display("failed to encode payload of '{discriminant}' on `{stage}`: {source}"))]
    EncodePayload {
        stage: &'static str,
        discriminant: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("unknown envelope discriminant '{discriminant}'"))]
    UnknownDiscriminant {
        stage: &'static str,
        discriminant: String,
    },
    #[snafu(display("unknown provider kind '{raw}'"))]
    UnknownProviderKind { stage: &'static str, raw: String },
}

pub type BridgeResult<T> = Result<T, BridgeError>;
