//! Compute provider access.

use std::sync::Arc;

pub mod invoker;
pub mod openstack;
pub mod provider;

pub use invoker::{act_by_name, ActionError, ServerAction};
pub use provider::{Address, ComputeClient, ComputeError, Server};

use crate::config::{ProviderKind, Settings};
use crate::error::Result;

/// Build the compute client named by the settings.
pub fn create_client(settings: &Settings) -> Result<Arc<dyn ComputeClient>> {
    match settings.provider {
        ProviderKind::OpenStack => Ok(Arc::new(openstack::OpenStackClient::from_settings(
            settings,
        )?)),
    }
}
