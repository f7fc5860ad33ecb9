pub mod disk;

pub use disk::{load_index, load_index_for_model, read_manifest, save_index};
