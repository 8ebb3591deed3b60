//! Versioned key policies for Armoricore transit operations
//!
//! Provides the key policy model, version resolution, lock-scoped policy
//! access, and pluggable (optionally encrypted) policy storage.
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


pub mod error;
pub mod key_types;
pub mod local_store;
pub mod policy;
pub mod policy_store;
pub mod service_integration;
pub mod storage;
pub mod version;

pub use error::{KeyError, KeyResult};
pub use key_types::KeyType;
pub use policy::{KeyPolicy, KeyVersion};
pub use policy_store::PolicyStore;
pub use service_integration::init_policy_store;
pub use storage::{MemoryPolicyStorage, PolicyStorage};
pub use version::{resolve_version, LATEST};
