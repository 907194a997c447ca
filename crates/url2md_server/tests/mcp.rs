mod common;

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url2md_core::JobStatus;
use url2md_server::mcp::types::{JsonRpcRequest, JsonRpcResponse};
use url2md_server::mcp::{handle_message, handle_request, serve_lines, Timeframe};
use url2md_server::{run_conversion, AppContext, ConversionRequest};
use uuid::Uuid;

use common::{article_site, context};

async fn call(ctx: &AppContext, method: &str, params: Value) -> JsonRpcResponse {
    handle_request(ctx, JsonRpcRequest::new(method, Some(params), Some(json!(1))))
        .await
        .expect("requests with an id get a response")
}

async fn result(ctx: &AppContext, method: &str, params: Value) -> Value {
    let response = call(ctx, method, params).await;
    assert!(response.error.is_none(), "{:?}", response.error);
    response.result.unwrap()
}

fn text_of(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

async fn completed_job(ctx: &AppContext, site_uri: &str) -> Uuid {
    let request = ConversionRequest {
        url: format!("{}/article", site_uri),
        include_images: true,
        clean_html: true,
    };
    let job = run_conversion(ctx, &request, "test").await;
    assert_eq!(job.status, JobStatus::Completed);
    job.id
}

#[tokio::test]
async fn initialize_reports_server_identity() {
    let ctx = context();
    let init = result(&ctx, "initialize", json!({ "protocolVersion": "2024-11-05" })).await;
    assert_eq!(init["serverInfo"]["name"], "url-to-markdown-converter");
    assert_eq!(init["protocolVersion"], "2024-11-05");
    assert!(init["capabilities"]["resources"].is_object());
}

#[tokio::test]
async fn notifications_get_no_response() {
    let ctx = context();
    let notification = JsonRpcRequest::new("notifications/initialized", None, None);
    assert!(handle_request(&ctx, notification).await.is_none());

    let wrong_version = handle_message(&ctx, r#"{"jsonrpc":"1.0","method":"ping"}"#).await;
    assert!(wrong_version.is_none());
}

#[tokio::test]
async fn unknown_method_and_bad_frames_are_protocol_errors() {
    let ctx = context();
    let response = call(&ctx, "tools/destroy", json!({})).await;
    assert_eq!(response.error.unwrap().code, -32601);

    let response = handle_message(&ctx, "{not json").await.unwrap();
    assert_eq!(response.error.unwrap().code, -32700);

    let response = handle_message(&ctx, r#"{"jsonrpc":"1.0","method":"ping","id":3}"#)
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32600);
    assert_eq!(response.id, Some(json!(3)));
}

#[tokio::test]
async fn tools_list_names_all_three_tools() {
    let ctx = context();
    let tools = result(&ctx, "tools/list", json!({})).await;
    let names: Vec<&str> = tools["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["convert_url_to_markdown", "get_conversion_status", "list_recent_conversions"]
    );
    assert_eq!(tools["tools"][0]["inputSchema"]["required"], json!(["url"]));
}

#[tokio::test]
async fn convert_tool_returns_title_and_markdown() {
    let site = article_site().await;
    let ctx = context();
    let url = format!("{}/article", site.uri());

    let outcome = result(
        &ctx,
        "tools/call",
        json!({ "name": "convert_url_to_markdown", "arguments": { "url": url, "cleanHtml": true } }),
    )
    .await;

    assert!(outcome.get("isError").is_none());
    let text = text_of(&outcome);
    assert!(text.starts_with(&format!(
        "Successfully converted URL: {}\n\nTitle: Rust Ownership Explained\n\n",
        url
    )));
    assert_eq!(ctx.store.len(), 1);
}

#[tokio::test]
async fn convert_tool_failures_are_error_results() {
    let site = article_site().await;
    let ctx = context();

    let outcome = result(
        &ctx,
        "tools/call",
        json!({
            "name": "convert_url_to_markdown",
            "arguments": { "url": format!("{}/missing", site.uri()) }
        }),
    )
    .await;
    assert_eq!(outcome["isError"], true);
    assert_eq!(
        text_of(&outcome),
        "Error: Conversion failed: HTTP 404: Not Found"
    );

    let outcome = result(
        &ctx,
        "tools/call",
        json!({ "name": "convert_url_to_markdown", "arguments": { "url": 42 } }),
    )
    .await;
    assert_eq!(outcome["isError"], true);
    assert_eq!(text_of(&outcome), "Error: URL is required and must be a string");
}

#[tokio::test]
async fn unknown_tool_is_an_error_result() {
    let ctx = context();
    let outcome = result(&ctx, "tools/call", json!({ "name": "teleport", "arguments": {} })).await;
    assert_eq!(outcome["isError"], true);
    assert_eq!(text_of(&outcome), "Error: Unknown tool: teleport");
}

#[tokio::test]
async fn status_tool_reports_job_fields() {
    let site = article_site().await;
    let ctx = context();
    let id = completed_job(&ctx, &site.uri()).await;

    let outcome = result(
        &ctx,
        "tools/call",
        json!({ "name": "get_conversion_status", "arguments": { "conversionId": id.to_string() } }),
    )
    .await;
    let status: Value = serde_json::from_str(text_of(&outcome)).unwrap();
    assert_eq!(status["id"], json!(id));
    assert_eq!(status["status"], "completed");
    assert_eq!(status["title"], "Rust Ownership Explained");
    assert_eq!(status["errorMessage"], Value::Null);

    let missing = Uuid::new_v4();
    let outcome = result(
        &ctx,
        "tools/call",
        json!({ "name": "get_conversion_status", "arguments": { "conversionId": missing.to_string() } }),
    )
    .await;
    assert_eq!(outcome["isError"], true);
    assert_eq!(
        text_of(&outcome),
        format!("Error: Conversion {} not found", missing)
    );
}

#[tokio::test]
async fn list_tool_respects_limit_and_order() {
    let ctx = context();
    for n in 0..7 {
        ctx.store.create(&format!("https://site.example/{n}"), true, false);
    }

    let outcome = result(
        &ctx,
        "tools/call",
        json!({ "name": "list_recent_conversions", "arguments": { "limit": 5 } }),
    )
    .await;
    let summaries: Vec<Value> = serde_json::from_str(text_of(&outcome)).unwrap();
    assert_eq!(summaries.len(), 5);
    assert_eq!(summaries[0]["url"], "https://site.example/6");
    assert!(summaries[0].get("markdown").is_none());
    let created: Vec<DateTime<Utc>> = summaries
        .iter()
        .map(|s| s["createdAt"].as_str().unwrap().parse().unwrap())
        .collect();
    let mut sorted = created.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(created, sorted);
}

#[tokio::test]
async fn resources_list_completed_conversions_and_aggregates() {
    let site = article_site().await;
    let ctx = context();
    let id = completed_job(&ctx, &site.uri()).await;
    ctx.store.create("https://pending.example", true, false);

    let listed = result(&ctx, "resources/list", json!({})).await;
    let uris: Vec<&str> = listed["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap())
        .collect();
    assert_eq!(
        uris,
        vec![
            format!("conversion://{}", id).as_str(),
            "stats://server",
            "logs://activity"
        ]
    );
    assert_eq!(
        listed["resources"][0]["name"],
        "Conversion: Rust Ownership Explained"
    );
    assert_eq!(listed["resources"][0]["mimeType"], "text/markdown");
}

#[tokio::test]
async fn reading_resources() {
    let site = article_site().await;
    let ctx = context();
    let id = completed_job(&ctx, &site.uri()).await;
    let uri = format!("conversion://{}", id);

    let read = result(&ctx, "resources/read", json!({ "uri": uri.clone() })).await;
    assert_eq!(read["contents"][0]["uri"], uri.as_str());
    assert_eq!(read["contents"][0]["mimeType"], "text/markdown");
    assert_eq!(
        read["contents"][0]["text"].as_str(),
        ctx.store.get(id).unwrap().markdown.as_deref()
    );

    let stats = result(&ctx, "resources/read", json!({ "uri": "stats://server" })).await;
    let parsed: Value = serde_json::from_str(stats["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(parsed["totalConversions"], 1);

    let logs = result(&ctx, "resources/read", json!({ "uri": "logs://activity" })).await;
    let entries: Vec<Value> =
        serde_json::from_str(logs["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(entries[0]["type"], "success");
}

#[tokio::test]
async fn resource_errors_map_to_protocol_errors() {
    let ctx = context();
    let pending = ctx.store.create("https://pending.example", true, false);

    let response = call(
        &ctx,
        "resources/read",
        json!({ "uri": format!("conversion://{}", pending.id) }),
    )
    .await;
    let error = response.error.unwrap();
    assert_eq!(error.code, -32002);
    assert_eq!(
        error.message,
        format!("Conversion {} is not completed or has no markdown content", pending.id)
    );

    let response = call(&ctx, "resources/read", json!({ "uri": "ftp://nope" })).await;
    assert_eq!(response.error.unwrap().message, "Unknown resource URI: ftp://nope");

    let response = call(&ctx, "resources/read", json!({})).await;
    assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn summarize_prompt_embeds_markdown() {
    let site = article_site().await;
    let ctx = context();
    let id = completed_job(&ctx, &site.uri()).await;

    let prompt = result(
        &ctx,
        "prompts/get",
        json!({ "name": "summarize_conversion", "arguments": { "conversionId": id.to_string() } }),
    )
    .await;
    let url = format!("{}/article", site.uri());
    assert_eq!(prompt["description"], format!("Summarize the conversion of {}", url));
    assert_eq!(prompt["messages"][0]["role"], "user");
    let text = prompt["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("Title: Rust Ownership Explained\n\nContent:\n"));
    assert!(text.ends_with("Keep the summary informative but concise (2-3 paragraphs maximum)."));

    let response = call(
        &ctx,
        "prompts/get",
        json!({ "name": "summarize_conversion", "arguments": {} }),
    )
    .await;
    assert_eq!(response.error.unwrap().message, "Conversion ID is required");
}

#[tokio::test]
async fn performance_prompt_counts_log_types() {
    let ctx = context();
    ctx.activity.success("ok", None);
    ctx.activity.error("bad", None);
    ctx.activity.warning("hmm", None);

    let prompt = result(
        &ctx,
        "prompts/get",
        json!({ "name": "analyze_server_performance" }),
    )
    .await;
    let text = prompt["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("- Total log entries: 3\n- Success entries: 1\n- Error entries: 1\n- Warning entries: 1"));
    assert!(text.contains("Active MCP Connections: 0"));
}

#[tokio::test]
async fn report_prompt_uses_timeframe() {
    let ctx = context();
    ctx.store.create("https://recent.example", false, true);

    let prompt = result(
        &ctx,
        "prompts/get",
        json!({ "name": "create_conversion_report", "arguments": { "timeframe": "last_hour" } }),
    )
    .await;
    assert_eq!(prompt["description"], "Generate a conversion report for last_hour");
    let text = prompt["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("\"url\": \"https://recent.example\""));
    assert!(text.contains("\"cleanHtml\": true"));

    assert_eq!(Timeframe::from_arg(Some("last_century")), Timeframe::LastDay);
    assert_eq!(Timeframe::from_arg(None), Timeframe::LastDay);
}

#[tokio::test]
async fn unknown_prompt_is_rejected() {
    let ctx = context();
    let response = call(&ctx, "prompts/get", json!({ "name": "haiku" })).await;
    assert_eq!(response.error.unwrap().message, "Unknown prompt: haiku");
}

#[tokio::test]
async fn stdio_transport_answers_line_by_line() {
    let ctx = context();
    let input = concat!(
        r#"{"jsonrpc":"2.0","method":"ping","id":1}"#,
        "\n\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"prompts/list","id":2}"#,
        "\n"
    );
    let mut output = Vec::new();

    serve_lines(&ctx, input.as_bytes(), &mut output, CancellationToken::new())
        .await
        .unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["id"], 2);
    assert_eq!(lines[1]["result"]["prompts"].as_array().unwrap().len(), 3);
}
