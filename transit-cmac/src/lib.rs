//! Transit CMAC generation
//!
//! Normalizes single-input and batch requests, resolves key versions under
//! a policy read lock, computes AES-CMAC per item and assembles an
//! order-preserving response.
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


pub mod assembler;
pub mod batch;
pub mod engine;
pub mod error;
pub mod handler;
pub mod request;

pub use error::{CmacError, CmacResult, ErrorKind};
pub use handler::CmacHandler;
pub use request::{BatchInputItem, BatchResponseItem, CmacRequest, CmacResponse};
