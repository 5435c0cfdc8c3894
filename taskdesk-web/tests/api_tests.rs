//! End-to-end tests over a real listener

mod helpers;

use chrono::Utc;
use helpers::{spawn_app, TestUser};
use serde_json::{json, Value};
use taskdesk_web::auth::Claims;
use taskdesk_web::cache::keys;

async fn body(response: reqwest::Response) -> Value {
    response.json().await.expect("Invalid JSON")
}

#[tokio::test]
async fn test_created_task_reaches_the_agent_queue() {
    let app = spawn_app().await;
    let admin = app.register(&TestUser::generate("admin")).await;
    let agent = app.register(&TestUser::generate("agent")).await;

    let task_id = app.create_task(&admin, &agent.id, "Call the customer back").await;

    let response = app.get_with_auth("/api/users/agent/tasks", &agent.token).await;
    assert_eq!(response.status().as_u16(), 200);
    let body = body(response).await;
    let tasks = body["data"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], task_id.as_str());
    assert_eq!(tasks[0]["status"], "pending");
    assert_eq!(tasks[0]["assignedTo"]["id"], agent.id.as_str());
    assert_eq!(body["fromCache"], false);
}

#[tokio::test]
async fn test_qa_cannot_list_users() {
    let app = spawn_app().await;
    let qa = app.register(&TestUser::generate("qa")).await;

    let response = app.get_with_auth("/api/users", &qa.token).await;
    assert_eq!(response.status().as_u16(), 403);
    let body = body(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_manager_cannot_delete_users() {
    let app = spawn_app().await;
    let manager = app.register(&TestUser::generate("manager")).await;
    let agent = app.register(&TestUser::generate("agent")).await;

    let response = app
        .delete_with_auth(&format!("/api/users/{}", agent.id), &manager.token)
        .await;
    assert_eq!(response.status().as_u16(), 403);
    // rejected on role, so no permission is named
    let body = body(response).await;
    assert_eq!(body["success"], false);
    assert!(body.get("requiredPermission").is_none());
}

#[tokio::test]
async fn test_demoted_manager_loses_access_immediately() {
    let app = spawn_app().await;
    let admin = app.register(&TestUser::generate("admin")).await;
    let manager = app.register(&TestUser::generate("manager")).await;

    let response = app.get_with_auth("/api/users", &manager.token).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .put_with_auth(
            &format!("/api/users/{}", manager.id),
            &admin.token,
            &json!({ "role": "agent" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    // same token, fresher role
    let response = app.get_with_auth("/api/users", &manager.token).await;
    assert_eq!(response.status().as_u16(), 403);
    let response = app.get_with_auth("/api/users/agent/tasks", &manager.token).await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_deleted_user_token_stops_working() {
    let app = spawn_app().await;
    let admin = app.register(&TestUser::generate("admin")).await;
    let agent = app.register(&TestUser::generate("agent")).await;

    let response = app
        .delete_with_auth(&format!("/api/users/{}", agent.id), &admin.token)
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["data"]["user"]["isActive"], false);

    let response = app.get_with_auth("/api/auth/me", &agent.token).await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        body(response).await["message"],
        "Account has been deactivated."
    );
}

#[tokio::test]
async fn test_bad_tokens_are_unauthorized() {
    let app = spawn_app().await;
    let agent = app.register(&TestUser::generate("agent")).await;

    let response = app
        .api_client
        .get(app.url("/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(
        body(response).await["message"],
        "Access denied. No token provided."
    );

    let tampered = format!("{}x", agent.token);
    let response = app.get_with_auth("/api/auth/me", &tampered).await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(body(response).await["message"], "Invalid token.");

    let now = Utc::now().timestamp();
    let claims = Claims {
        id: agent.id.clone(),
        email: "expired@example.com".to_string(),
        role: taskdesk_core::Role::Agent,
        first_name: "Old".to_string(),
        last_name: "Token".to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let expired = app.state.users.jwt().sign(&claims).unwrap();
    let response = app.get_with_auth("/api/auth/me", &expired).await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(body(response).await["message"], "Token has expired.");
}

#[tokio::test]
async fn test_logout_revokes_token_and_clears_cookie() {
    let app = spawn_app().await;
    let user = TestUser::generate("manager");
    let browser = app.browser();

    let response = browser
        .post(app.url("/api/auth/register"))
        .json(&user.to_register_json())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let token = body(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string();

    // the cookie alone authenticates
    let response = browser.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["data"]["user"]["email"], user.email.as_str());

    let response = browser.post(app.url("/api/auth/logout")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert_eq!(body(response).await["message"], "Logged out successfully");

    let response = browser.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app.get_with_auth("/api/auth/me", &token).await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(body(response).await["message"], "Token has been invalidated.");
}

#[tokio::test]
async fn test_admin_cannot_remove_or_demote_self() {
    let app = spawn_app().await;
    let admin = app.register(&TestUser::generate("admin")).await;
    let path = format!("/api/users/{}", admin.id);

    let response = app.delete_with_auth(&path, &admin.token).await;
    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(
        body(response).await["message"],
        "You cannot delete your own account"
    );

    let response = app
        .put_with_auth(&path, &admin.token, &json!({ "role": "agent" }))
        .await;
    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(
        body(response).await["message"],
        "You cannot change your own role"
    );
}

#[tokio::test]
async fn test_password_never_leaves_the_server() {
    let app = spawn_app().await;
    let user = TestUser::generate("agent");
    let registered = app.register(&user).await;

    let response = app.post_json("/api/auth/login", &user.to_login_json()).await;
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.unwrap();
    assert!(!text.contains("password"));
    assert!(!text.contains(&user.password));

    let response = app.get_with_auth("/api/auth/me", &registered.token).await;
    let text = response.text().await.unwrap();
    assert!(!text.contains("password"));
}

#[tokio::test]
async fn test_login_failures_share_one_message() {
    let app = spawn_app().await;
    let user = TestUser::generate("agent");
    app.register(&user).await;

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": user.email, "password": "wrong_password" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(body(response).await["message"], "Invalid credentials");

    let response = app
        .post_json(
            "/api/auth/login",
            &json!({ "email": "nobody@example.com", "password": user.password }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(body(response).await["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_login_reports_role() {
    let app = spawn_app().await;
    let user = TestUser::generate("qa");
    app.register(&user).await;

    let response = app.post_json("/api/auth/login", &user.to_login_json()).await;
    let body = body(response).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["role"], "qa");
    assert!(body["data"]["user"]["lastLogin"].is_string());
}

#[tokio::test]
async fn test_task_for_non_agent_is_rejected() {
    let app = spawn_app().await;
    let manager = app.register(&TestUser::generate("manager")).await;
    let qa = app.register(&TestUser::generate("qa")).await;

    let response = app
        .post_with_auth(
            "/api/tasks",
            &manager.token,
            &json!({ "title": "Review the logs", "assignedTo": qa.id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(body(response).await["message"], "Invalid agent selected");
}

#[tokio::test]
async fn test_user_lookup_reports_cache_hits() {
    let app = spawn_app().await;
    let admin = app.register(&TestUser::generate("admin")).await;
    let agent = app.register(&TestUser::generate("agent")).await;
    let path = format!("/api/users/{}", agent.id);

    // registration already cached the agent
    let response = app.get_with_auth(&path, &admin.token).await;
    assert_eq!(body(response).await["fromCache"], true);

    let response = app
        .put_with_auth(&path, &admin.token, &json!({ "firstName": "Renamed" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["message"], "User updated successfully");

    // the update rewrote the cached entry
    let response = app.get_with_auth(&path, &admin.token).await;
    let cached = body(response).await;
    assert_eq!(cached["fromCache"], true);
    assert_eq!(cached["data"]["user"]["firstName"], "Renamed");

    app.state.cache.del(&keys::user(&agent.id)).await;
    let response = app.get_with_auth(&path, &admin.token).await;
    let stored = body(response).await;
    assert_eq!(stored["fromCache"], false);
    assert_eq!(stored["data"]["user"]["firstName"], "Renamed");

    let response = app.get_with_auth(&path, &admin.token).await;
    assert_eq!(body(response).await["fromCache"], true);
}

#[tokio::test]
async fn test_agent_may_only_change_status() {
    let app = spawn_app().await;
    let manager = app.register(&TestUser::generate("manager")).await;
    let agent = app.register(&TestUser::generate("agent")).await;
    let task_id = app.create_task(&manager, &agent.id, "Restock the shelves").await;
    let path = format!("/api/tasks/{}", task_id);

    let response = app
        .put_with_auth(&path, &agent.token, &json!({ "title": "Something easier" }))
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .put_with_auth(&path, &agent.token, &json!({ "status": "in-progress" }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["data"]["task"]["status"], "in-progress");
}

#[tokio::test]
async fn test_other_agents_tasks_are_hidden() {
    let app = spawn_app().await;
    let manager = app.register(&TestUser::generate("manager")).await;
    let owner = app.register(&TestUser::generate("agent")).await;
    let stranger = app.register(&TestUser::generate("agent")).await;
    let task_id = app.create_task(&manager, &owner.id, "Inventory count").await;

    let response = app
        .get_with_auth(&format!("/api/tasks/{}", task_id), &stranger.token)
        .await;
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(body(response).await["message"], "Task not found");
}

#[tokio::test]
async fn test_assign_qa_links_agent() {
    let app = spawn_app().await;
    let manager = app.register(&TestUser::generate("manager")).await;
    let agent = app.register(&TestUser::generate("agent")).await;
    let qa = app.register(&TestUser::generate("qa")).await;

    let response = app
        .post_with_auth(
            "/api/users/assign-qa",
            &manager.token,
            &json!({ "agentId": agent.id, "qaId": qa.id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body = body(response).await;
    assert_eq!(body["message"], "Agent assigned to QA successfully");
    assert_eq!(body["data"]["agent"]["assignedQa"], qa.id.as_str());
}

#[tokio::test]
async fn test_delete_task() {
    let app = spawn_app().await;
    let manager = app.register(&TestUser::generate("manager")).await;
    let agent = app.register(&TestUser::generate("agent")).await;
    let task_id = app.create_task(&manager, &agent.id, "Temporary task").await;
    let path = format!("/api/tasks/{}", task_id);

    let response = app.delete_with_auth(&path, &agent.token).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app.delete_with_auth(&path, &manager.token).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(body(response).await["message"], "Task deleted successfully");

    let response = app.get_with_auth(&path, &manager.token).await;
    assert_eq!(response.status().as_u16(), 404);
}
