//! Post-processing passes: bloom, tone mapping and the final blit

mod bloom;
mod tonemapping;

pub use bloom::{BLOOM_INPUT_SLOT, BLOOM_MIP_CHAIN_MAX};
