//! Storage mechanisms for persisting and retrieving account records

pub mod memory;
pub mod traits;

pub use memory::MemoryAccountStore;
pub use traits::{
    Account, AccountDraft, AccountFilter, AccountPatch, AccountStorage, AccountView, Profile,
    SearchField,
};
