use axum::http::StatusCode;
use axum_test::TestServer;
use product_workflow::{
    server::Server,
    store::{create_store, DatabaseConfig},
};
use serde_json::{json, Value};

async fn test_server() -> TestServer {
    let store = create_store(&DatabaseConfig::in_memory())
        .await
        .expect("Failed to create store");
    store.init().await.expect("Failed to initialize store");

    let server = Server::new(store).expect("Failed to build server");
    TestServer::new(server.build_router()).unwrap()
}

async fn post(client: &TestServer, path: &str, payload: Value) -> Value {
    let response = client.post(path).json(&payload).await;
    if response.status_code() != StatusCode::CREATED {
        eprintln!("Response status: {}", response.status_code());
        eprintln!("Response body: {}", response.text());
    }
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

fn id(value: &Value) -> i64 {
    value["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let client = test_server().await;

    let response = client.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_product_crud_and_duplicate_name() {
    let client = test_server().await;

    let product = post(
        &client,
        "/api/products",
        json!({ "name": "Widget", "description": "A small widget" }),
    )
    .await;
    assert_eq!(product["name"], "Widget");
    let product_id = id(&product);

    // Duplicate names are rejected with the constraint that failed
    let response = client
        .post("/api/products")
        .json(&json!({ "name": "Widget" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["constraint"], "unique_product_name");
    assert_eq!(body["field"], "name");

    // Blank names never reach the store
    let response = client
        .post("/api/products")
        .json(&json!({ "name": "   " }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = client
        .put(&format!("/api/products/{}", product_id))
        .json(&json!({ "name": "Gadget", "description": "Renamed" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["name"], "Gadget");

    let response = client.get("/api/products").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["label"], "Gadget");

    let response = client.delete(&format!("/api/products/{}", product_id)).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = client.get(&format!("/api/products/{}", product_id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_steps_and_transitions_are_scoped_to_their_workflow() {
    let client = test_server().await;

    let onboarding = post(&client, "/api/workflows", json!({ "name": "Onboarding" })).await;
    let returns = post(&client, "/api/workflows", json!({ "name": "Returns" })).await;

    let draft = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&onboarding), "name": "Draft", "order": 1 }),
    )
    .await;
    assert_eq!(draft["order"], 1);

    let response = client
        .post("/api/steps")
        .json(&json!({ "workflow_id": id(&onboarding), "name": "Draft", "order": 2 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["constraint"], "unique_step_name_per_workflow");

    let response = client
        .post("/api/steps")
        .json(&json!({ "workflow_id": id(&onboarding), "name": "Review", "order": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["constraint"], "unique_step_order_per_workflow");
    assert_eq!(body["field"], "order");

    // The same name is fine in another workflow
    let received = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&returns), "name": "Draft", "order": 1 }),
    )
    .await;

    let response = client
        .post("/api/transitions")
        .json(&json!({
            "workflow_id": id(&onboarding),
            "from_step_id": id(&draft),
            "to_step_id": id(&received),
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"], "Both steps must belong to the same workflow.");

    let response = client
        .post("/api/steps")
        .json(&json!({ "workflow_id": 999, "name": "Orphan", "order": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = client
        .get(&format!("/api/steps?workflow_id={}", id(&onboarding)))
        .await;
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["label"], "Onboarding - Draft (Order: 1)");
}

#[tokio::test]
async fn test_product_workflow_detail() {
    let client = test_server().await;

    let product = post(&client, "/api/products", json!({ "name": "Widget" })).await;
    let workflow = post(
        &client,
        "/api/workflows",
        json!({ "name": "Release", "description": "Ship it" }),
    )
    .await;
    let workflow_id = id(&workflow);

    // Inserted out of order on purpose
    let publish = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": workflow_id, "name": "Publish", "order": 3 }),
    )
    .await;
    let draft = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": workflow_id, "name": "Draft", "order": 1 }),
    )
    .await;
    let review = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": workflow_id, "name": "Review", "order": 2 }),
    )
    .await;

    post(
        &client,
        "/api/transitions",
        json!({
            "workflow_id": workflow_id,
            "from_step_id": id(&draft),
            "to_step_id": id(&review),
            "condition": "ready for review",
        }),
    )
    .await;
    post(
        &client,
        "/api/transitions",
        json!({
            "workflow_id": workflow_id,
            "from_step_id": id(&review),
            "to_step_id": id(&publish),
        }),
    )
    .await;
    post(
        &client,
        "/api/transitions",
        json!({
            "workflow_id": workflow_id,
            "from_step_id": id(&review),
            "to_step_id": id(&draft),
            "condition": "changes requested",
        }),
    )
    .await;

    let response = client
        .post("/api/transitions")
        .json(&json!({
            "workflow_id": workflow_id,
            "from_step_id": id(&review),
            "to_step_id": id(&draft),
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let product_workflow = post(
        &client,
        "/api/product_workflows",
        json!({ "product_id": id(&product), "workflow_id": workflow_id }),
    )
    .await;
    let pw_id = id(&product_workflow);
    assert!(product_workflow["current_step_id"].is_null());

    let response = client
        .post("/api/product_workflows")
        .json(&json!({ "product_id": id(&product), "workflow_id": workflow_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["constraint"], "unique_product_workflow");

    let response = client.get(&format!("/api/product_workflows/{}/detail", pw_id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let orders: Vec<i64> = body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["order"].as_i64().unwrap())
        .collect();
    assert_eq!(orders, vec![1, 2, 3]);
    assert_eq!(body["transitions"].as_array().unwrap().len(), 3);
    assert_eq!(body["available_transitions"].as_array().unwrap().len(), 0);
    assert_eq!(
        body["label"],
        format!(
            "Product ID:{} - Workflow ID:{} (Current Step: None)",
            id(&product),
            workflow_id
        )
    );

    let response = client
        .put(&format!("/api/product_workflows/{}/current_step", pw_id))
        .json(&json!({ "step_id": id(&review) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["current_step_name"], "Review");

    let response = client.get(&format!("/api/product_workflows/{}/detail", pw_id)).await;
    let body: Value = response.json();
    assert_eq!(body["available_transitions"].as_array().unwrap().len(), 2);

    let response = client.get(&format!("/product_workflow/{}/", pw_id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let page = response.text();
    assert!(page.contains("Widget"));
    assert!(page.contains("Workflow: Release"));
    assert!(page.contains("Current step: <strong>Review</strong>"));
    assert!(page.contains("changes requested"));
    let draft_at = page.find("Draft (Order: 1)").unwrap();
    let review_at = page.find("Review (Order: 2)").unwrap();
    let publish_at = page.find("Publish (Order: 3)").unwrap();
    assert!(draft_at < review_at && review_at < publish_at);
}

#[tokio::test]
async fn test_detail_of_missing_product_workflow_is_not_found() {
    let client = test_server().await;

    let response = client.get("/product_workflow/42/").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = client.get("/api/product_workflows/42/detail").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "Not found: ProductWorkflow 42 does not exist");
}

#[tokio::test]
async fn test_current_step_must_belong_to_workflow() {
    let client = test_server().await;

    let product = post(&client, "/api/products", json!({ "name": "Widget" })).await;
    let release = post(&client, "/api/workflows", json!({ "name": "Release" })).await;
    let returns = post(&client, "/api/workflows", json!({ "name": "Returns" })).await;
    let foreign = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&returns), "name": "Received", "order": 1 }),
    )
    .await;
    let product_workflow = post(
        &client,
        "/api/product_workflows",
        json!({ "product_id": id(&product), "workflow_id": id(&release) }),
    )
    .await;
    let pw_id = id(&product_workflow);

    let response = client
        .put(&format!("/api/product_workflows/{}/current_step", pw_id))
        .json(&json!({ "step_id": id(&foreign) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = client
        .put(&format!("/api/product_workflows/{}/current_step", pw_id))
        .json(&json!({ "step_id": null }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert!(body["current_step_id"].is_null());

    let response = client.delete(&format!("/api/workflows/{}", id(&release))).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    let response = client.get(&format!("/api/product_workflows/{}", pw_id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let client = test_server().await;

    client.get("/api/product_workflows/7/detail").await;

    let response = client.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("productworkflow_detail_lookups_total"));
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let client = test_server().await;
    let workflow = post(&client, "/api/workflows", json!({ "name": "Release" })).await;

    let response = client.post("/api/products").json(&json!({})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("name"));

    let response = client
        .post("/api/steps")
        .json(&json!({ "workflow_id": id(&workflow), "name": "Draft", "order": -1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());

    let response = client.get("/api/products?limit=many").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());

    // Non-numeric ids name no resource
    let response = client.get("/product_workflow/abc/").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].is_string());

    let response = client.delete("/api/steps/abc").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_workflow_admin_update() {
    let client = test_server().await;

    let widget = post(&client, "/api/products", json!({ "name": "Widget" })).await;
    let release = post(&client, "/api/workflows", json!({ "name": "Release" })).await;
    let returns = post(&client, "/api/workflows", json!({ "name": "Returns" })).await;
    let draft = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&release), "name": "Draft", "order": 1 }),
    )
    .await;
    let received = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&returns), "name": "Received", "order": 1 }),
    )
    .await;

    let in_release = post(
        &client,
        "/api/product_workflows",
        json!({ "product_id": id(&widget), "workflow_id": id(&release) }),
    )
    .await;
    let in_returns = post(
        &client,
        "/api/product_workflows",
        json!({ "product_id": id(&widget), "workflow_id": id(&returns) }),
    )
    .await;

    // Moving onto a pair that already exists
    let response = client
        .put(&format!("/api/product_workflows/{}", id(&in_release)))
        .json(&json!({ "product_id": id(&widget), "workflow_id": id(&returns) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["constraint"], "unique_product_workflow");

    // A current step from another workflow
    let response = client
        .put(&format!("/api/product_workflows/{}", id(&in_release)))
        .json(&json!({
            "product_id": id(&widget),
            "workflow_id": id(&release),
            "current_step_id": id(&received),
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    // Keeping its own pair and choosing its own step is fine
    let response = client
        .put(&format!("/api/product_workflows/{}", id(&in_release)))
        .json(&json!({
            "product_id": id(&widget),
            "workflow_id": id(&release),
            "current_step_id": id(&draft),
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["current_step_name"], "Draft");

    let response = client
        .get(&format!("/api/product_workflows?workflow_id={}", id(&returns)))
        .await;
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], id(&in_returns));
    assert_eq!(
        body[0]["label"],
        format!(
            "Product ID:{} - Workflow ID:{} (Current Step: None)",
            id(&widget),
            id(&returns)
        )
    );
}

#[tokio::test]
async fn test_transition_update_and_detail_scoping() {
    let client = test_server().await;

    let widget = post(&client, "/api/products", json!({ "name": "Widget" })).await;
    let release = post(&client, "/api/workflows", json!({ "name": "Release" })).await;
    let returns = post(&client, "/api/workflows", json!({ "name": "Returns" })).await;
    let draft = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&release), "name": "Draft", "order": 1 }),
    )
    .await;
    let publish = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&release), "name": "Publish", "order": 2 }),
    )
    .await;
    let received = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&returns), "name": "Received", "order": 1 }),
    )
    .await;
    let refunded = post(
        &client,
        "/api/steps",
        json!({ "workflow_id": id(&returns), "name": "Refunded", "order": 2 }),
    )
    .await;

    let ship = post(
        &client,
        "/api/transitions",
        json!({
            "workflow_id": id(&release),
            "from_step_id": id(&draft),
            "to_step_id": id(&publish),
        }),
    )
    .await;
    post(
        &client,
        "/api/transitions",
        json!({
            "workflow_id": id(&returns),
            "from_step_id": id(&received),
            "to_step_id": id(&refunded),
        }),
    )
    .await;

    // Repointing an edge at another workflow's step
    let response = client
        .put(&format!("/api/transitions/{}", id(&ship)))
        .json(&json!({ "from_step_id": id(&draft), "to_step_id": id(&refunded) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = client
        .put(&format!("/api/transitions/{}", id(&ship)))
        .json(&json!({
            "from_step_id": id(&publish),
            "to_step_id": id(&draft),
            "condition": "rollback",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["condition"], "rollback");

    let response = client
        .get(&format!("/api/transitions?workflow_id={}", id(&release)))
        .await;
    let body: Value = response.json();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["label"], "Publish -> Draft (Workflow: Release)");

    let product_workflow = post(
        &client,
        "/api/product_workflows",
        json!({ "product_id": id(&widget), "workflow_id": id(&release) }),
    )
    .await;

    let response = client
        .get(&format!("/api/product_workflows/{}/detail", id(&product_workflow)))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let transitions = body["transitions"].as_array().unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0]["id"], id(&ship));
    assert!(body["steps"]
        .as_array()
        .unwrap()
        .iter()
        .all(|step| step["workflow_id"] == id(&release)));
}
