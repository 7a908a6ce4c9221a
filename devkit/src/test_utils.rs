/*!
Test Harness pour la console FleetDeck

Facilite l'écriture de tests avec:
- Setup automatique du stub `FleetApi`
- Configurations rapides pour poller et moniteur
- Assertions sur les appels enregistrés
*/

use fleetdeck_console::api::SharedApi;
use fleetdeck_console::config::{MonitorConf, PollerConf};
use fleetdeck_console::models::ProbeKind;
use fleetdeck_console::{DeploymentPoller, NodeHealthMonitor, WizardSession};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::fleet_stub::{MockFleetApi, RecordedCall};

/// Capture les traces `tracing` de la console dans la sortie des tests.
/// `RUST_LOG` prime sur le filtre par défaut.
fn init_console_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fleetdeck_console=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Harness de test complet pour la console
pub struct TestHarness {
    pub api: Arc<MockFleetApi>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Crée un nouveau harness de test
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests (stubs `log`)
        init_console_tracing();

        Self { api: Arc::new(MockFleetApi::new()) }
    }

    /// Le stub vu comme `FleetApi` partagé
    pub fn shared(&self) -> SharedApi {
        self.api.clone()
    }

    pub fn session(&self) -> WizardSession {
        WizardSession::new(self.shared())
    }

    /// Session qui lance le poller dès que le déploiement est accepté
    pub fn deploying_session(&self, max_attempts: u32) -> WizardSession {
        WizardSession::with_poller(self.shared(), self.poller(max_attempts))
    }

    /// Poller à 2s d'intervalle et `max_attempts` tentatives
    pub fn poller(&self, max_attempts: u32) -> DeploymentPoller {
        DeploymentPoller::new(self.shared(), &PollerConf { interval_ms: 2_000, max_attempts })
    }

    /// Moniteur avec les seuils par défaut (10s / 30s)
    pub fn monitor(&self) -> NodeHealthMonitor {
        NodeHealthMonitor::new(self.shared(), &MonitorConf::default())
    }

    /// Vérifie qu'un seul déploiement a été soumis
    pub fn assert_single_submission(&self) {
        let calls = self.api.generate_calls();
        assert_eq!(calls.len(), 1, "expected exactly one generate call, got {}", calls.len());
    }

    pub fn assert_no_submission(&self) {
        let calls = self.api.generate_calls();
        assert!(calls.is_empty(), "unexpected generate calls: {:?}", calls);
    }

    pub fn assert_probed(&self, kind: ProbeKind, times: usize) {
        let count = self.api.probe_calls(kind).len();
        assert_eq!(count, times, "expected {} {} probes, got {}", times, kind.as_str(), count);
    }

    /// Vérifie que `ip` a été interrogé au moins `min` fois
    pub fn assert_status_polled(&self, ip: &str, min: usize) {
        let count = self.api.status_queries(ip);
        assert!(count >= min, "expected at least {} status queries for {}, got {}", min, ip, count);
    }

    pub fn assert_called(&self, call: &RecordedCall) {
        let calls = self.api.calls();
        assert!(calls.contains(call), "call {:?} not found in {:?}", call, calls);
    }
}
