use murmur::{
    Coordinator, Delivery, DispatchRequest, Exchange, Method, Options, RouteDescriptor, RouteSource, Stage,
    StageError, Step,
};
use serde_json::{Value, json};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let routes = RouteSource::new()
        .middleware(Stage::middleware(require_user).named("require_user"))
        .middleware(Stage::infrastructure("body_parser"))
        .middleware(Stage::error_handler(unauthorized))
        .route(RouteDescriptor::new(Method::Get, "/users/:id", vec![Stage::middleware(get_user)])?)
        .route(RouteDescriptor::new(Method::Get, "/profiles/:id.:format?", vec![Stage::middleware(profile)])?)
        .route(RouteDescriptor::new(Method::Post, "/users", vec![Stage::middleware(create_user)])?);

    let app = Coordinator::init(routes, Options::from_json(r#"{"timeout_ms": 1000}"#)?);

    let one = app.dispatch(DispatchRequest::new("get", "/users/42").identity("alice")).await?;
    println!("single: {one:?}");

    let denied = app.dispatch(DispatchRequest::new("get", "/users/42")).await?;
    println!("anonymous: {denied:?}");

    let batch = vec![
        DispatchRequest::new("get", "/profiles/7.json").identity("alice").sequence(1),
        DispatchRequest::new("post", "/users").identity("alice").body(r#"{"name":"bob"}"#).sequence(0),
        DispatchRequest::new("get", "/nowhere").identity("alice"),
    ];
    if let Delivery::Many(results) = app.send(batch).await? {
        for (index, slot) in results.iter().enumerate() {
            println!("[{index}] {slot:?}");
        }
    }

    Ok(())
}

async fn require_user(ex: Exchange) -> Step {
    if ex.request.identity().is_none() {
        return ex.fail("not signed in");
    }
    ex.next()
}

async fn unauthorized(err: StageError, ex: Exchange) -> Step {
    ex.response.redirect(format!("/login?reason={err}"))
}

async fn get_user(ex: Exchange) -> Step {
    let id = ex.request.param("id", Value::Null);
    ex.response.send(json!({ "id": id, "by": ex.request.identity() }))
}

async fn profile(ex: Exchange) -> Step {
    let id = ex.request.param("id", Value::Null);
    match ex.request.param("format", "html").as_str() {
        Some("json") => ex.response.send(json!({ "id": id })),
        _ => ex.response.render("users/profile", json!({ "id": id })),
    }
}

async fn create_user(mut ex: Exchange) -> Step {
    let name = ex.request.param("name", "anonymous");
    ex.request.flash_mut().push("info", "user created");
    ex.response.send_with_status(json!({ "name": name }), http::StatusCode::CREATED)
}
