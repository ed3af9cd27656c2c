//! A suite plays the database behind a JDBC controller

use actions::{ActionRegistry, TestSuite, TestSuiteDefinition};
use e2e_tests::TestFramework;
use endpoint::DirectEndpointAdapter;
use framework_config::FrameworkSettings;
use jdbc_server::{JdbcController, JdbcEndpointAdapterController, JdbcEndpointConfiguration};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const SETTINGS: &str = r#"
[defaults]
receive_timeout_ms = 2000
polling_interval_ms = 10

[jdbc]
max_connections = 1

[endpoints.database]
type = "direct_sync"
queue = "database"
"#;

const DATABASE: &str = r#"
name = "database"

[[tests]]
name = "orders-table"

[[tests.actions]]
action = "receive"
endpoint = "database"
control = { headers = { trellis_jdbc_operation = "open_connection" } }

[[tests.actions]]
action = "send"
endpoint = "database"
payload = { success = true }

[[tests.actions]]
action = "receive"
endpoint = "database"
control = { payload = { execute = { sql = "SELECT * FROM orders" } }, headers = { trellis_jdbc_operation = "execute" } }

[[tests.actions]]
action = "send"
endpoint = "database"
payload = { success = true, data_set = [{ id = 1, state = "shipped" }, { id = 2, state = "open" }] }

[[tests.actions]]
action = "receive"
endpoint = "database"
control = { headers = { trellis_jdbc_operation = "close_connection" } }

[[tests.actions]]
action = "send"
endpoint = "database"
payload = { success = true }

[[tests.actions]]
action = "receive-timeout"
endpoint = "database"
timeout_ms = 100
"#;

fn stack() -> (TestSuite, JdbcEndpointAdapterController) {
    let settings = FrameworkSettings::from_toml_str(SETTINGS).unwrap();
    let framework = TestFramework::new(settings.clone()).unwrap();

    let adapter = DirectEndpointAdapter::new(
        framework.endpoints().channel("database"),
        endpoint::EndpointConfiguration::new()
            .with_timeout(Duration::from_secs(2))
            .with_polling_interval(Duration::from_millis(10)),
    );
    let controller = JdbcEndpointAdapterController::new(
        JdbcEndpointConfiguration::new("orders")
            .with_settings(&settings.jdbc)
            .with_auto_connect(false),
        Arc::new(adapter),
    )
    .unwrap();

    let definition = TestSuiteDefinition::from_toml_str(DATABASE).unwrap();
    let suite = TestSuite::from_definition(&definition, &ActionRegistry::new(), &settings)
        .unwrap()
        .with_resolver(framework.resolver().clone());
    (suite, controller)
}

#[tokio::test]
async fn test_controller_talks_to_suite_database() {
    let (suite, controller) = stack();

    let client = async {
        let properties = BTreeMap::from([("user".to_string(), "trellis".to_string())]);
        controller.open_connection(&properties).await?;

        let orders = controller.execute_query("SELECT * FROM orders").await?;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders.value(0, "state").unwrap(), "shipped");

        // auto handled, the suite never sees it
        assert_eq!(controller.execute_update("SELECT 1").await?, 0);

        controller.close_connection().await
    };

    let (report, client) = tokio::join!(suite.run(), client);
    client.unwrap();

    let result = report.result("orders-table").unwrap();
    assert!(result.is_success(), "{:?}", result.cause);
    assert_eq!(controller.connections(), 0);
}

#[tokio::test]
async fn test_connection_limit_from_settings() {
    let (_suite, controller) = stack();
    assert_eq!(controller.configuration().max_connections, 1);

    let no_server = JdbcEndpointAdapterController::new(
        controller.configuration().clone().with_auto_connect(true),
        Arc::new(endpoint::EmptyEndpointAdapter),
    )
    .unwrap();
    let properties = BTreeMap::new();
    no_server.open_connection(&properties).await.unwrap();
    let err = no_server.open_connection(&properties).await.unwrap_err();
    assert_eq!(err.to_string(), "Maximum number of connections (1) reached");

    no_server.close_connection().await.unwrap();
    no_server.close_connection().await.unwrap();
    assert_eq!(no_server.connections(), 0);
}
