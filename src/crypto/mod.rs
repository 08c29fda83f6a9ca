pub mod checksum;
pub mod ecc_curve;
pub mod eddsa;
pub mod hash;
pub mod public_key;
pub mod rsa;
pub mod s2k;
pub mod sym;
