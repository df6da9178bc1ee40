//! Time synchronisation

use hardening::{
    HardenError, HardenResult, Hardener, HardenerRegistry, SchemaError, TopicContext, TopicKey,
    Value, found,
};

use super::parsers;

pub fn register(registry: &mut HardenerRegistry) -> Result<(), SchemaError> {
    registry.register(NtpSyncEnabled)
}

struct NtpSyncEnabled;

impl Hardener for NtpSyncEnabled {
    fn key(&self) -> TopicKey {
        TopicKey::new("time_synchronisation", "ntp_sync_enabled")
    }

    /// The selected peer must be the `ntp_server` of the description
    fn check(&self, ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        let out = ctx.shell.run("/usr/sbin/ntpq -p")?;
        let Some(peer) = parsers::ntp_peer(&out) else {
            return Err(HardenError::stop(
                "Unable to determine the address of the ntp server",
            ));
        };
        let server = ctx.require_setting("ntp_server")?;
        if server != peer {
            return Err(HardenError::stop(format!(
                "Peer server should be trying to sync with the server {server} but it is instead trying to sync with IP address {peer}."
            )));
        }
        found(true)
    }
}
