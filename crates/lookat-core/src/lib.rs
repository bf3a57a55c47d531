//! Target resolution, information providers and the rate-limited
//! request/reply exchange that ships their values from server to client.
//!
//! A [`Registry`] is filled at startup with [`TargetTypeDef`]s and
//! [`InformationProvider`]s, frozen, and shared by a [`ServerDispatcher`] and
//! a [`ClientDispatcher`]. The dispatchers exchange [`RequestData`] and
//! [`DataUpdate`] payloads; moving them between peers is left to the caller.

pub mod client;
pub mod game;
pub mod protocol;
pub mod provider;
pub mod rate_limit;
pub mod registry;
pub mod server;
pub mod target;
pub mod view;
pub mod wire;

#[cfg(test)]
mod testutil;

pub use client::{ClientDispatcher, Fact, FactSource, TargetInfo};
pub use game::{DecodeContext, Game};
pub use protocol::{DataUpdate, RequestData, nonce_precedes};
pub use provider::{AnyValue, InformationProvider, ProviderId, ProviderSide, ProviderValue};
pub use rate_limit::RateLimitTracker;
pub use registry::{Registry, RegistryError};
pub use server::{ClientConnectionState, ServerDispatcher};
pub use target::{Target, TargetTypeDef, TargetTypeId, TargetValue};
pub use view::ProviderView;
pub use wire::{WireError, WireReader, WireWriter};
