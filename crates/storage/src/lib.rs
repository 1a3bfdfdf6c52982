pub mod error;
pub mod local_fs;
pub mod memory;
pub mod object_store;
pub mod registry;

pub use error::StorageError;
pub use local_fs::LocalFsStore;
pub use memory::MemoryStore;
pub use object_store::{CHUNK_SIZE, ObjectMeta, ObjectReader, ObjectStore, ObjectWriter};
pub use object_store::{read_all, write_all};
pub use registry::{StoreFactory, StoreRegistry};
