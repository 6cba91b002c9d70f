use actix_web::{test, web, App};
use serde_json::{json, Value};

use circle::config::Config;
use circle::server::{handle_all, ServerState};

fn config() -> Config {
    Config::new("integration-test-secret", 300).unwrap()
}

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(ServerState::new(config())))
                .default_service(web::route().to(handle_all)),
        )
        .await
    };
}

macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req).await;
        let status = resp.status().as_u16();
        let body = test::read_body(resp).await;
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

fn register_body(nickname: &str) -> Value {
    json!({
        "name": nickname,
        "nickname": nickname,
        "email": format!("{}@x.com", nickname),
        "password": "password",
    })
}

fn login_body(nickname: &str) -> Value {
    json!({ "email": format!("{}@x.com", nickname), "password": "password" })
}

#[actix_web::test]
async fn test_full_user_flow() {
    let app = app!();

    // 1. Register
    let req = test::TestRequest::post()
        .uri("/usuarios/register")
        .set_json(register_body("alice"))
        .to_request();
    let (status, user) = call!(app, req);
    assert_eq!(status, 201);
    assert!(user.get("id").is_some(), "User ID missing in register response: {:?}", user);
    assert!(user.get("password_hash").is_none());
    let user_id = user["id"].as_i64().unwrap();

    // 2. Login
    let req = test::TestRequest::post()
        .uri("/usuarios/login")
        .set_json(login_body("alice"))
        .to_request();
    let (status, login) = call!(app, req);
    assert_eq!(status, 200);
    let token = login["token"].as_str().unwrap().to_string();

    // 3. Create post
    let req = test::TestRequest::post()
        .uri("/posts/create")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "T", "body": "C" }))
        .to_request();
    let (status, post) = call!(app, req);
    assert_eq!(status, 201);
    assert_eq!(post["owner_id"], user_id);
    let post_id = post["id"].as_i64().unwrap();

    // 4. Partial update keeps the body
    let req = test::TestRequest::put()
        .uri(&format!("/posts/update/{}", post_id))
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "T2" }))
        .to_request();
    let (status, edited) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(edited["post"]["title"], "T2");
    assert_eq!(edited["post"]["body"], "C");
    assert!(edited["post"]["updated_at"].is_string(), "updated_at should be set after edit");

    // 5. Own posts
    let req = test::TestRequest::get()
        .uri("/posts/get")
        .insert_header(bearer(&token))
        .to_request();
    let (status, posts) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(posts.as_array().unwrap().len(), 1);

    // 6. Profile update
    let req = test::TestRequest::put()
        .uri("/usuarios/me")
        .insert_header(bearer(&token))
        .set_json(json!({ "name": "Alice Liddell" }))
        .to_request();
    let (status, me) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(me["name"], "Alice Liddell");
    assert_eq!(me["nickname"], "alice");

    let req = test::TestRequest::get()
        .uri(&format!("/usuarios/info/{}", user_id))
        .to_request();
    let (status, info) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(info["name"], "Alice Liddell");

    // 7. Delete post
    let req = test::TestRequest::delete()
        .uri(&format!("/posts/delete/{}", post_id))
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 200);

    let req = test::TestRequest::get()
        .uri("/posts/get")
        .insert_header(bearer(&token))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 404);
}

#[actix_web::test]
async fn test_follow_gates_visibility() {
    let app = app!();

    let mut tokens = Vec::new();
    let mut ids = Vec::new();
    for nickname in ["alice", "bob"] {
        let req = test::TestRequest::post()
            .uri("/usuarios/register")
            .set_json(register_body(nickname))
            .to_request();
        let (status, user) = call!(app, req);
        assert_eq!(status, 201);
        ids.push(user["id"].as_i64().unwrap());

        let req = test::TestRequest::post()
            .uri("/usuarios/login")
            .set_json(login_body(nickname))
            .to_request();
        let (status, login) = call!(app, req);
        assert_eq!(status, 200);
        tokens.push(login["token"].as_str().unwrap().to_string());
    }
    let (alice_id, bob_id) = (ids[0], ids[1]);
    let (alice, bob) = (tokens[0].clone(), tokens[1].clone());

    let req = test::TestRequest::post()
        .uri("/posts/create")
        .insert_header(bearer(&alice))
        .set_json(json!({ "title": "P", "body": "hello" }))
        .to_request();
    let (_, post) = call!(app, req);
    let post_uri = format!("/posts/getpost/{}", post["id"]);
    let posts_uri = format!("/posts/user-posts/{}", alice_id);

    for uri in [&post_uri, &posts_uri] {
        let req = test::TestRequest::get().uri(uri).insert_header(bearer(&bob)).to_request();
        let (status, _) = call!(app, req);
        assert_eq!(status, 403, "{}", uri);
    }

    // bob follows alice
    let req = test::TestRequest::post()
        .uri("/following/follow")
        .insert_header(bearer(&bob))
        .set_json(json!({ "followee_id": alice_id }))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, 201);
    assert_eq!(body["user"]["id"], alice_id);

    let req = test::TestRequest::get().uri(&post_uri).insert_header(bearer(&bob)).to_request();
    let (status, seen) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(seen["title"], "P");

    let req = test::TestRequest::get().uri(&posts_uri).insert_header(bearer(&bob)).to_request();
    let (status, seen) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(seen.as_array().unwrap().len(), 1);

    // no mutual yet
    let req = test::TestRequest::get()
        .uri("/following/mutual")
        .insert_header(bearer(&alice))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 404);

    let req = test::TestRequest::post()
        .uri("/following/follow")
        .insert_header(bearer(&alice))
        .set_json(json!({ "followee_id": bob_id }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 201);

    for (token, other) in [(&alice, bob_id), (&bob, alice_id)] {
        let req = test::TestRequest::get()
            .uri("/following/mutual")
            .insert_header(bearer(token))
            .to_request();
        let (status, mutual) = call!(app, req);
        assert_eq!(status, 200);
        assert_eq!(mutual[0]["id"], other);
    }

    // unfollow revokes access
    let req = test::TestRequest::delete()
        .uri("/following/unfollow")
        .insert_header(bearer(&bob))
        .set_json(json!({ "followee_id": alice_id }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 200);

    let req = test::TestRequest::delete()
        .uri("/following/unfollow")
        .insert_header(bearer(&bob))
        .set_json(json!({ "followee_id": alice_id }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 404);

    let req = test::TestRequest::get().uri(&post_uri).insert_header(bearer(&bob)).to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 403);

    // self follow
    let req = test::TestRequest::post()
        .uri("/following/follow")
        .insert_header(bearer(&bob))
        .set_json(json!({ "followee_id": bob_id }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 400);
}

#[actix_web::test]
async fn test_register_conflicts_and_login_errors() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/usuarios/register")
        .set_json(register_body("alice"))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 201);

    let req = test::TestRequest::post()
        .uri("/usuarios/register")
        .set_json(register_body("alice"))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 400);

    let req = test::TestRequest::post()
        .uri("/usuarios/register")
        .set_json(json!({ "name": "x" }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 400);

    let req = test::TestRequest::post()
        .uri("/usuarios/login")
        .set_json(json!({ "email": "nobody@x.com", "password": "password" }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 404);

    let req = test::TestRequest::post()
        .uri("/usuarios/login")
        .set_json(json!({ "email": "alice@x.com", "password": "wrong" }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 400);
}

#[actix_web::test]
async fn test_user_list_paging() {
    let app = app!();

    for nickname in ["ann", "ben", "cat"] {
        let req = test::TestRequest::post()
            .uri("/usuarios/register")
            .set_json(register_body(nickname))
            .to_request();
        let (status, _) = call!(app, req);
        assert_eq!(status, 201);
    }

    let req = test::TestRequest::get().uri("/usuarios/list?page=2&limit=2").to_request();
    let (status, page) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(page["total_items"], 3);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["current_page"], 2);
    assert_eq!(page["data"][0]["nickname"], "cat");
    assert!(page["data"][0].get("password_hash").is_none());

    let req = test::TestRequest::get().uri("/usuarios/list?limit=0").to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 400);
}

#[actix_web::test]
async fn test_account_deletion_cascades() {
    let app = app!();

    let mut tokens = Vec::new();
    let mut ids = Vec::new();
    for nickname in ["alice", "bob"] {
        let req = test::TestRequest::post()
            .uri("/usuarios/register")
            .set_json(register_body(nickname))
            .to_request();
        let (_, user) = call!(app, req);
        ids.push(user["id"].as_i64().unwrap());
        let req = test::TestRequest::post()
            .uri("/usuarios/login")
            .set_json(login_body(nickname))
            .to_request();
        let (_, login) = call!(app, req);
        tokens.push(login["token"].as_str().unwrap().to_string());
    }

    let req = test::TestRequest::post()
        .uri("/following/follow")
        .insert_header(bearer(&tokens[0]))
        .set_json(json!({ "followee_id": ids[1] }))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 201);

    let req = test::TestRequest::delete()
        .uri("/usuarios/me")
        .insert_header(bearer(&tokens[1]))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 200);

    // the deleted account's token is dead
    let req = test::TestRequest::get()
        .uri("/posts/get")
        .insert_header(bearer(&tokens[1]))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 401);

    // and the edge pointing at it is gone
    let req = test::TestRequest::get()
        .uri("/following/followed")
        .insert_header(bearer(&tokens[0]))
        .to_request();
    let (status, _) = call!(app, req);
    assert_eq!(status, 404);
}

#[actix_web::test]
async fn test_create_post_requires_auth() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/posts/create")
        .set_json(json!({ "title": "T", "body": "Test post without auth" }))
        .to_request();
    let (status, body) = call!(app, req);
    assert_eq!(status, 401);
    assert!(body["error"].is_string());
}

#[actix_web::test]
async fn test_text_round_trips_unchanged() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/usuarios/register")
        .set_json(json!({
            "name": "Tom & Jerry",
            "nickname": "tom",
            "email": "tom@x.com",
            "password": "password",
        }))
        .to_request();
    let (status, user) = call!(app, req);
    assert_eq!(status, 201);
    assert_eq!(user["name"], "Tom & Jerry");

    let req = test::TestRequest::post()
        .uri("/usuarios/login")
        .set_json(login_body("tom"))
        .to_request();
    let (_, login) = call!(app, req);
    let token = login["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/posts/create")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "Q&A: 1 < 2?", "body": "\"quotes\" & 'ticks' > none" }))
        .to_request();
    let (status, post) = call!(app, req);
    assert_eq!(status, 201);

    let req = test::TestRequest::get()
        .uri(&format!("/posts/getpost/{}", post["id"]))
        .insert_header(bearer(&token))
        .to_request();
    let (status, fetched) = call!(app, req);
    assert_eq!(status, 200);
    assert_eq!(fetched["title"], "Q&A: 1 < 2?");
    assert_eq!(fetched["body"], "\"quotes\" & 'ticks' > none");
    assert_eq!(fetched["author"]["name"], "Tom & Jerry");
}
