/*!
# FleetDeck DevKit - Stubs et utilitaires de test

Bibliothèque facilitant les tests de la console FleetDeck avec:
- Stub scripté de l'API Fleet Management (sans serveur)
- Serveur HTTP de simulation pour tester le client reqwest
- Builders de statuts agent réalistes
- Harness de test avec assertions sur les appels enregistrés
*/

pub mod fixtures;
pub mod fleet_stub;
pub mod mock_server;
pub mod test_utils;

pub use fixtures::AgentStatusBuilder;
pub use fleet_stub::{MockFleetApi, RecordedCall, ScriptedStatus};
pub use mock_server::{spawn_mock_server, MockServer};
pub use test_utils::TestHarness;
