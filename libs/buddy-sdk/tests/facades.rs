#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Facade behavior against a mock Buddy API.

use buddy_http::{HttpClientBuilder, HttpClientConfig, encode_query};
use buddy_sdk::adapter::{ReadOutcome, read_outcome};
use buddy_sdk::resources::{GroupOps, ProjectFilter, ProjectOps, VariableFilter};
use buddy_sdk::{
    BuddyClient, CallContext, DELETE_FAILED_MESSAGE, ErrorKind, Nullable, ProviderConfig,
    SortOptions,
};
use httpmock::prelude::*;
use serde_json::{Value, json};

fn client(server: &MockServer) -> BuddyClient {
    let config = ProviderConfig::new("s3cret").with_base_url(server.base_url());
    BuddyClient::with_http_builder(
        &config,
        HttpClientBuilder::with_config(HttpClientConfig::for_testing()),
    )
    .unwrap()
}

fn projects_page(server: &MockServer, first: usize, count: usize) -> Value {
    let projects: Vec<Value> = (first..first + count)
        .map(|i| json!({ "name": format!("p{i}"), "display_name": format!("Project {i}") }))
        .collect();
    json!({
        "url": server.url("/workspaces/acme/projects"),
        "html_url": "https://app.buddy.works/acme",
        "projects": projects,
    })
}

#[tokio::test]
async fn list_walks_pages_until_an_empty_one() {
    let server = MockServer::start();
    let pages = [(1, 0, 30), (2, 30, 17), (3, 47, 0)].map(|(page, first, count)| {
        let body = projects_page(&server, first, count);
        server.mock(|when, then| {
            when.method(GET)
                .path("/workspaces/acme/projects")
                .query_param("page", page.to_string())
                .query_param("per_page", "30");
            then.status(200).json_body(body);
        })
    });

    let (list, raw) = client(&server)
        .projects()
        .list(&CallContext::background(), "acme", &ProjectFilter::default())
        .await
        .unwrap();

    for page in &pages {
        page.assert_calls(1);
    }
    assert_eq!(raw.status, http::StatusCode::OK);
    assert_eq!(list.projects.len(), 47);
    let names: Vec<&str> = list.projects.iter().map(|p| p.name.as_str()).collect();
    let expected: Vec<String> = (0..47).map(|i| format!("p{i}")).collect();
    assert_eq!(names, expected);
    assert_eq!(list.html_url, "https://app.buddy.works/acme");
}

#[tokio::test]
async fn list_forwards_sort_options_on_every_page() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(GET)
            .path("/workspaces/acme/members")
            .query_param("sort_by", "name")
            .query_param("page", "1");
        then.status(200)
            .json_body(json!({ "members": [{ "id": 1, "email": "a@acme.io" }] }));
    });
    let last = server.mock(|when, then| {
        when.method(GET)
            .path("/workspaces/acme/members")
            .query_param("sort_by", "name")
            .query_param("page", "2");
        then.status(200).json_body(json!({ "members": [] }));
    });

    let sort = SortOptions {
        sort_by: "name".to_owned(),
        ..SortOptions::default()
    };
    let (members, _) = client(&server)
        .members()
        .list(&CallContext::background(), "acme", &sort)
        .await
        .unwrap();

    first.assert();
    last.assert();
    assert_eq!(members.members.len(), 1);
    assert_eq!(members.members[0].email, "a@acme.io");
}

#[tokio::test]
async fn delete_answered_with_200_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/workspaces/acme/projects/web");
        then.status(200).json_body(json!({ "name": "web" }));
    });

    let err = client(&server)
        .projects()
        .delete(&CallContext::background(), "acme", "web")
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), DELETE_FAILED_MESSAGE);
    assert_eq!(err.kind(), ErrorKind::Http);
}

#[tokio::test]
async fn delete_of_missing_resource_keeps_the_404() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(DELETE).path("/workspaces/acme/webhooks/9");
        then.status(404)
            .json_body(json!({ "errors": [{ "message": "Webhook not found" }] }));
    });

    let err = client(&server)
        .webhooks()
        .delete(&CallContext::background(), "acme", 9)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.response().unwrap().message, "Webhook not found");
}

#[tokio::test]
async fn read_of_deleted_resource_is_absent() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/workspaces/acme/projects/web/pipelines/7");
        then.status(404)
            .json_body(json!({ "errors": [{ "message": "Pipeline not found" }] }));
    });

    let client = client(&server);
    let outcome = read_outcome(
        client
            .pipelines()
            .get(&CallContext::background(), "acme", "web", 7)
            .await,
    )
    .unwrap();
    assert!(matches!(outcome, ReadOutcome::Absent));
}

#[tokio::test]
async fn second_create_with_same_name_fails_with_client_error() {
    let server = MockServer::start();
    let ops = ProjectOps {
        name: Some("web".to_owned()),
        display_name: Some("Web".to_owned()),
        ..ProjectOps::default()
    };
    let request_body = json!({ "name": "web", "display_name": "Web" });

    let mut created = server.mock(|when, then| {
        when.method(POST)
            .path("/workspaces/acme/projects")
            .json_body(request_body.clone());
        then.status(201)
            .json_body(json!({ "name": "web", "display_name": "Web", "status": "ACTIVE" }));
    });

    let client = client(&server);
    let ctx = CallContext::background();
    let (project, raw) = client.projects().create(&ctx, "acme", &ops).await.unwrap();
    assert_eq!(raw.status, http::StatusCode::CREATED);
    assert_eq!(project.status, "ACTIVE");
    created.assert();
    created.delete();

    let duplicate = server.mock(|when, then| {
        when.method(POST)
            .path("/workspaces/acme/projects")
            .json_body(request_body.clone());
        then.status(400).json_body(json!({
            "errors": [{ "message": "Project with given name already exists" }]
        }));
    });

    let err = client
        .projects()
        .create(&ctx, "acme", &ops)
        .await
        .unwrap_err();
    duplicate.assert_calls(1);
    assert!(err.status().unwrap().is_client_error());
    assert_eq!(
        err.response().unwrap().message,
        "Project with given name already exists"
    );
}

#[tokio::test]
async fn update_sends_only_set_fields_and_explicit_nulls() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PATCH)
            .path("/workspaces/acme/groups/3")
            .header("content-type", "application/json")
            .json_body(json!({ "name": "ops", "description": null }));
        then.status(200)
            .json_body(json!({ "id": 3, "name": "ops", "description": "" }));
    });

    let ops = GroupOps {
        name: Some("ops".to_owned()),
        description: Nullable::Null,
        ..GroupOps::default()
    };
    let (group, _) = client(&server)
        .groups()
        .update(&CallContext::background(), "acme", 3, &ops)
        .await
        .unwrap();

    mock.assert();
    assert_eq!(group.name, "ops");
}

#[test]
fn unset_options_encode_to_nothing() {
    assert_eq!(serde_json::to_value(ProjectOps::default()).unwrap(), json!({}));
    assert_eq!(encode_query(&VariableFilter::default()).unwrap(), "");

    let filter = VariableFilter {
        project_name: "web".to_owned(),
        ..VariableFilter::default()
    };
    assert_eq!(encode_query(&filter).unwrap(), "projectName=web");
}
