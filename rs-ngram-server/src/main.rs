use std::env;
use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, post, put, web};

use rs_ngram_core::{Error, Model};
use serde::Deserialize;

/// Query parameters of `/v1/reply` and `/v1/entropy`
#[derive(Deserialize)]
struct TextQuery {
	text: Option<String>,
}

/// Query parameters of `/v1/count`
#[derive(Deserialize)]
struct CountQuery {
	/// Space separated tokens
	ngram: Option<String>,
}

struct SharedData {
	model: Model,
}

macro_rules! lock {
	($data:expr) => {
		match $data.lock() {
			Ok(m) => m,
			Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
		}
	};
}

/// HTTP POST endpoint `/v1/learn`
///
/// Trains the model on every non-empty line of the body.
/// Returns the number of lines learned.
#[post("/v1/learn")]
async fn post_learn(data: web::Data<Mutex<SharedData>>, body: String) -> impl Responder {
	let mut shared_data = lock!(data);

	let lines = body.lines().filter(|line| !line.trim().is_empty());
	match shared_data.model.train_all(lines) {
		Ok(learned) => HttpResponse::Ok().body(learned.to_string()),
		Err(e @ Error::InvalidToken(_)) => HttpResponse::BadRequest().body(e.to_string()),
		Err(e) => HttpResponse::InternalServerError().body(format!("Failed to learn: {e}")),
	}
}

/// HTTP GET endpoint `/v1/reply`
///
/// Replies to `text`. An input the model knows nothing about gets an empty reply.
#[get("/v1/reply")]
async fn get_reply(data: web::Data<Mutex<SharedData>>, query: web::Query<TextQuery>) -> impl Responder {
	let text = match &query.text {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty text"),
	};

	let shared_data = lock!(data);
	match shared_data.model.reply(text) {
		Ok(reply) => HttpResponse::Ok().body(reply),
		Err(Error::NoPivot) => {
			log::info!("no pivot for {text:?}, empty reply");
			HttpResponse::Ok().body("")
		}
		Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

/// HTTP GET endpoint `/v1/count`
#[get("/v1/count")]
async fn get_count(data: web::Data<Mutex<SharedData>>, query: web::Query<CountQuery>) -> impl Responder {
	let ngram: Vec<&str> = match &query.ngram {
		Some(s) => s.split_whitespace().collect(),
		None => return HttpResponse::BadRequest().body("Missing ngram"),
	};

	let shared_data = lock!(data);
	match shared_data.model.get_ngram_count(&ngram) {
		Ok(count) => HttpResponse::Ok().body(count.to_string()),
		Err(e) => HttpResponse::BadRequest().body(e.to_string()),
	}
}

/// HTTP GET endpoint `/v1/entropy`
#[get("/v1/entropy")]
async fn get_entropy(data: web::Data<Mutex<SharedData>>, query: web::Query<TextQuery>) -> impl Responder {
	let text = query.text.as_deref().unwrap_or_default();

	let shared_data = lock!(data);
	match shared_data.model.entropy(text) {
		Ok(bits) => HttpResponse::Ok().body(bits.to_string()),
		Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
	}
}

/// HTTP PUT endpoint `/v1/freeze`
///
/// Freezes the in-memory counts; returns the record count of every order.
#[put("/v1/freeze")]
async fn put_freeze(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = lock!(data);
	match shared_data.model.freeze_counts() {
		Ok(records) => {
			let records: Vec<String> = records.iter().map(u32::to_string).collect();
			HttpResponse::Ok().body(records.join("\n"))
		}
		Err(e) => HttpResponse::InternalServerError().body(format!("Failed to freeze: {e}")),
	}
}

/// Main entry point for the server.
///
/// Opens the model, wraps it in a `Mutex` for thread safety,
/// and starts an Actix-web HTTP server.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - `NGRAM_MODEL_DIR` (default `./data/brain`) and `NGRAM_ORDER` (default 3)
///   select the model.
/// - `RUST_LOG` controls logging.
#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();

	let dir = env::var("NGRAM_MODEL_DIR").unwrap_or_else(|_| "./data/brain".to_owned());
	let order = match env::var("NGRAM_ORDER") {
		Ok(s) => s.parse::<usize>().map_err(|e| format!("Invalid NGRAM_ORDER {s:?}: {e}"))?,
		Err(_) => 3,
	};

	let shared_data = SharedData {
		model: Model::open(&dir, order)?,
	};
	let shared_model = web::Data::new(Mutex::new(shared_data));

	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_model.clone())
			.service(post_learn)
			.service(get_reply)
			.service(get_count)
			.service(get_entropy)
			.service(put_freeze)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await?;

	Ok(())
}
