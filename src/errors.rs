use color_eyre::eyre::Report;
use std::fmt;

/// Failure taxonomy for orchestrated operations, in classification priority
/// order. Every raw failure maps to exactly one kind; anything unrecognized
/// falls through to `TransactionFailed`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    InsufficientFunds,
    UserRejected,
    ProviderUnavailable,
    TransactionFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InsufficientFunds => "Insufficient funds",
            ErrorKind::UserRejected => "Request rejected",
            ErrorKind::ProviderUnavailable => "Wallet provider unavailable",
            ErrorKind::TransactionFailed => "Transaction failed",
        };
        write!(f, "{name}")
    }
}

/// A raw failure after classification. The original message is preserved so
/// `TransactionFailed` can be displayed verbatim.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassifiedFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedFailure {
    pub fn display_text(&self) -> String {
        match self.kind {
            ErrorKind::TransactionFailed => format!("Transaction failed: {}", self.message),
            other => other.to_string(),
        }
    }
}

// Markers the contracts and the wallet/provider plumbing are known to emit.
const INSUFFICIENCY_MARKERS: &[&str] = &[
    "InsufficientBalance",
    "Insufficient balance",
    "NotEnoughCoins",
    "not enough coins",
];

const REJECTION_MARKERS: &[&str] = &[
    "Invalid password",
    "password prompt was declined",
];

const NO_PROVIDER_MARKERS: &[&str] = &[
    "no wallet provider",
    "Failed to connect to provider",
];

/// Maps a rendered failure into the taxonomy. Pure and total: the same input
/// always yields the same kind, and no input escapes unclassified.
pub fn classify_text(raw: &str) -> ErrorKind {
    if INSUFFICIENCY_MARKERS.iter().any(|m| raw.contains(m)) {
        ErrorKind::InsufficientFunds
    } else if REJECTION_MARKERS.iter().any(|m| raw.contains(m)) {
        ErrorKind::UserRejected
    } else if NO_PROVIDER_MARKERS.iter().any(|m| raw.contains(m)) {
        ErrorKind::ProviderUnavailable
    } else {
        ErrorKind::TransactionFailed
    }
}

pub fn classify(raw: &Report) -> ClassifiedFailure {
    let message = format!("{raw:#}");
    ClassifiedFailure {
        kind: classify_text(&message),
        message,
    }
}
