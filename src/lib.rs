use std::path::{
    Path,
    PathBuf,
};

pub mod client;

pub mod deployment;

pub mod errors;

pub mod session;

pub mod surface;

pub mod ui;

pub mod wallets;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub mod assessment_types {
    use fuels::macros::abigen;

    abigen!(Contract(
        name = "Assessment",
        abi = "contracts/assessment-abi.json"
    ));
}

pub mod guessing_types {
    use fuels::macros::abigen;

    abigen!(Contract(
        name = "GuessingGame",
        abi = "contracts/guessing-game-abi.json"
    ));
}

pub(crate) fn manifest_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}
