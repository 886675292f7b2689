pub mod serde_hex_bytes;
