//! Secret sharing: plain Shamir, verifiable Pedersen and the protocols
//! running them over the bulletin board.

mod pedersen;
mod pedersen_basic;
mod poly_in_exponent;
mod sequential;
mod shamir;

pub use pedersen::Pedersen;
pub use pedersen_basic::{PedersenSharing, SharingState};
pub use poly_in_exponent::PolynomialInExponent;
pub use sequential::PedersenSequential;
pub use shamir::ShamirSharing;
