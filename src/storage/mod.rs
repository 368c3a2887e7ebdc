// Storage module - local filesystem side of the commands

pub mod delete;
pub mod listing;
pub mod partial;
pub mod verification;

pub use delete::delete_file;
pub use listing::{list_dir, serialize, serialize_capped};
pub use partial::PartialFile;
pub use verification::{file_digest, file_digest_hex, TransferDigest};
