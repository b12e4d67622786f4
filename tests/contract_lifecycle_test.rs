//! End-to-end tests for the contract endpoints: composite creation,
//! detail assembly, item replacement on update, search, and deletion.

mod common;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{response_json, TestApp};

fn dec(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected a decimal string, got {value}"))
        .parse()
        .expect("decimal field failed to parse")
}

fn contract_payload(code: &str, supplier: &str) -> Value {
    json!({
        "code": code,
        "name": "Suministro de Amoxicilina",
        "tender_reference": "2025LN-000001",
        "legal_reference": "C-0001-2025",
        "supplier": supplier,
        "currency": "CRC",
        "items": [
            {
                "code": "1-10-20-1234",
                "name": "Amoxicilina 500mg",
                "currency": "CRC",
                "unit_price": "125.50"
            }
        ],
        "initial_period": {
            "start_date": "2025-01-01",
            "end_date": "2025-12-31",
            "allocated_budget": "1000",
            "currency": "CRC"
        }
    })
}

async fn create_contract(app: &TestApp, code: &str, supplier: &str) -> Value {
    let response = app
        .post("/api/v1/contracts", contract_payload(code, supplier))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_json(response).await["data"].clone()
}

#[tokio::test]
async fn creating_a_contract_also_creates_its_items_and_first_period() {
    let app = TestApp::new().await;

    let contract = create_contract(&app, "CONT-001", "Farmaceutica del Valle S.A.").await;
    assert_eq!(contract["code"], "CONT-001");
    assert_eq!(contract["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(contract["items"][0]["code"], "1-10-20-1234");

    let contract_id = contract["id"].as_str().expect("contract id missing");
    let response = app.get(&format!("/api/v1/contracts/{contract_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let detail = response_json(response).await["data"].clone();
    let periods = detail["periods"].as_array().expect("periods missing");
    assert_eq!(periods.len(), 1);

    let period = &periods[0]["period"];
    assert_eq!(period["name"], "Periodo 1");
    assert_eq!(period["status"], "active");
    assert_eq!(period["start_date"], "2025-01-01");
    assert_eq!(period["end_date"], "2025-12-31");
    assert_eq!(dec(&period["allocated_budget"]), Decimal::from(1000));
    assert_eq!(dec(&period["current_budget"]), Decimal::from(1000));
    assert_eq!(dec(&period["balance"]), Decimal::from(1000));
}

#[tokio::test]
async fn contract_creation_enforces_the_item_count() {
    let app = TestApp::new().await;

    let mut no_items = contract_payload("CONT-002", "Proveedor");
    no_items["items"] = json!([]);
    let response = app.post("/api/v1/contracts", no_items).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut too_many = contract_payload("CONT-003", "Proveedor");
    too_many["items"] = json!([
        {"code": "A", "name": "Uno"},
        {"code": "B", "name": "Dos"},
        {"code": "C", "name": "Tres"},
        {"code": "D", "name": "Cuatro"}
    ]);
    let response = app.post("/api/v1/contracts", too_many).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    let message = body["message"].as_str().unwrap_or_default();
    assert!(
        message.contains("between one and three items"),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn contract_creation_rejects_inverted_period_dates() {
    let app = TestApp::new().await;

    let mut payload = contract_payload("CONT-004", "Proveedor");
    payload["initial_period"]["start_date"] = json!("2025-12-31");
    payload["initial_period"]["end_date"] = json!("2025-01-01");

    let response = app.post("/api/v1/contracts", payload).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_contract_returns_not_found() {
    let app = TestApp::new().await;

    let response = app
        .get(&format!("/api/v1/contracts/{}", Uuid::new_v4()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .contains("not found"));
}

#[tokio::test]
async fn updating_a_contract_replaces_its_items() {
    let app = TestApp::new().await;
    let contract = create_contract(&app, "CONT-005", "Proveedor Uno").await;
    let contract_id = contract["id"].as_str().expect("contract id missing");

    let response = app
        .put(
            &format!("/api/v1/contracts/{contract_id}"),
            json!({
                "supplier": "Proveedor Dos",
                "items": [
                    {"code": "NEW-1", "name": "Ibuprofeno 400mg", "unit_price": "10"},
                    {"code": "NEW-2", "name": "Ibuprofeno 600mg", "unit_price": "15"}
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let updated = response_json(response).await["data"].clone();
    assert_eq!(updated["supplier"], "Proveedor Dos");
    let items = updated["items"].as_array().expect("items missing");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["code"], "NEW-1");
    assert_eq!(items[0]["position"], 0);
    assert_eq!(items[1]["code"], "NEW-2");
    assert_eq!(items[1]["position"], 1);
}

#[tokio::test]
async fn deleting_a_contract_removes_it_and_its_periods() {
    let app = TestApp::new().await;
    let contract = create_contract(&app, "CONT-006", "Proveedor").await;
    let contract_id = contract["id"].as_str().expect("contract id missing");

    let response = app
        .delete(&format!("/api/v1/contracts/{contract_id}"))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/v1/contracts/{contract_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn contract_search_matches_code_name_and_supplier() {
    let app = TestApp::new().await;
    create_contract(&app, "CONT-100", "Laboratorios Stein").await;
    create_contract(&app, "CONT-200", "Distribuidora Central").await;

    let response = app.get("/api/v1/contracts?search=Stein").await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = response_json(response).await["data"].clone();
    assert_eq!(data["total"], 1);
    assert_eq!(data["contracts"][0]["code"], "CONT-100");

    let response = app.get("/api/v1/contracts?search=CONT-200").await;
    let data = response_json(response).await["data"].clone();
    assert_eq!(data["total"], 1);
    assert_eq!(data["contracts"][0]["supplier"], "Distribuidora Central");

    let response = app.get("/api/v1/contracts?search=no-such-thing").await;
    let data = response_json(response).await["data"].clone();
    assert_eq!(data["total"], 0);
}

#[tokio::test]
async fn contract_list_paginates() {
    let app = TestApp::new().await;
    for n in 0..3 {
        create_contract(&app, &format!("PAGE-{n}"), "Proveedor").await;
    }

    let response = app.get("/api/v1/contracts?page=2&per_page=2").await;
    let data = response_json(response).await["data"].clone();
    assert_eq!(data["total"], 3);
    assert_eq!(data["page"], 2);
    assert_eq!(data["per_page"], 2);
    assert_eq!(data["contracts"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn added_periods_chain_after_the_latest_one() {
    let app = TestApp::new().await;
    let contract = create_contract(&app, "CONT-007", "Proveedor").await;
    let contract_id = contract["id"].as_str().expect("contract id missing");

    // Name and start date omitted on purpose.
    let response = app
        .post(
            &format!("/api/v1/contracts/{contract_id}/periods"),
            json!({
                "end_date": "2026-12-31",
                "allocated_budget": "500"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let period = response_json(response).await["data"].clone();
    assert_eq!(period["name"], "Periodo 2");
    assert_eq!(period["start_date"], "2026-01-01");
    assert_eq!(period["status"], "pending");

    let response = app
        .get(&format!("/api/v1/contracts/{contract_id}/periods"))
        .await;
    let periods = response_json(response).await["data"].clone();
    assert_eq!(periods.as_array().map(Vec::len), Some(2));
}
