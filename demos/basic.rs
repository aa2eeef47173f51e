use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use webhook_jobs::{DispatchPipeline, JobContext, JobDescriptor, JobError, RuntimeTag, SchedulerConfig};

#[derive(Debug, Serialize, Deserialize)]
struct Email {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sent {
    status: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let email = JobDescriptor::<Email, Sent>::new("/jobs/email");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = SchedulerConfig::builder()
        .base_url(format!("http://{addr}"))
        .runtime(RuntimeTag::ServerProcess)
        .build();

    let handler = email.on_receive(&config, |ctx: JobContext<Email>| async move {
        tracing::info!(name = %ctx.payload.name, "sending email");
        Ok::<_, JobError>(Sent { status: true })
    });

    let app = axum::Router::new().route(
        email.route(),
        axum::routing::any(move |request: axum::extract::Request| {
            let handler = handler.clone();
            async move { handler.dispatch(request).await.into_response() }
        }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let outcome = email
        .send(&config, &Email { name: "sarim".into() })
        .await
        .unwrap();
    println!("{}", serde_json::to_string(&outcome).unwrap());
}
