// img2relief - Turn an image into a relief mesh or a generated 3D model
//
// Pipeline:
//   1. Acquire the input image (file on disk, or text prompt via the
//      image-generation provider)
//   2. Estimate depth (local MiDaS or the Gemini vision model) and
//      build the displaced plane, or request a full model (Stability
//      sync, Meshy task + poll)
//   3. Export OBJ/STL, or write the GLB through untouched
//
// Usage: img2relief [image] [--provider midas|gemini|stability|meshy]
//                   [--prompt TEXT] [--image-url URL] [--out FILE]
//                   [--width N] [--height N] [--scale S]
//                   [--range unit|ten] [--lenient]

use std::env;
use std::fs;
use std::process;
use std::time::Duration;

use relief_engine::config::{GridSpec, ProviderConfig, SourceRange};
use relief_engine::export;
use relief_engine::mesh::{MeshGeometry, DEFAULT_DEPTH_SCALE};
use relief_engine::providers::{gemini, meshy, midas, pollinations, stability};
use relief_engine::DepthOutcome;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_DEADLINE: Duration = Duration::from_secs(300);

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let mut input: Option<String> = None;
    let mut provider = String::from("midas");
    let mut prompt: Option<String> = None;
    let mut image_url: Option<String> = None;
    let mut out: Option<String> = None;
    let mut width = 32usize;
    let mut height = 32usize;
    let mut scale = DEFAULT_DEPTH_SCALE;
    let mut range = SourceRange::UNIT;
    let mut lenient = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--provider" => { provider = args.get(i + 1).cloned().unwrap_or(provider); i += 2; }
            "--prompt" => { prompt = args.get(i + 1).cloned(); i += 2; }
            "--image-url" => { image_url = args.get(i + 1).cloned(); i += 2; }
            "--out" => { out = args.get(i + 1).cloned(); i += 2; }
            "--width" => { width = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(32); i += 2; }
            "--height" => { height = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(32); i += 2; }
            "--scale" => { scale = args.get(i + 1).and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_DEPTH_SCALE); i += 2; }
            "--range" => {
                range = match args.get(i + 1).map(String::as_str) {
                    Some("ten") => SourceRange::TEN,
                    _ => SourceRange::UNIT,
                };
                i += 2;
            }
            "--lenient" => { lenient = true; i += 1; }
            arg if !arg.starts_with("--") && input.is_none() => { input = Some(arg.to_string()); i += 1; }
            _ => i += 1,
        }
    }

    if input.is_none() && prompt.is_none() && image_url.is_none() {
        eprintln!(
            "Usage: {} [image] [--provider midas|gemini|stability|meshy] [--prompt TEXT] [--image-url URL] [--out FILE]",
            args[0]
        );
        process::exit(1);
    }

    let mut spec = match GridSpec::new(width, height, range) {
        Ok(spec) => spec,
        Err(e) => fail(&e.to_string()),
    };
    if lenient {
        spec = spec.lenient();
    }

    let providers = ProviderConfig::from_env();

    // Acquire input image bytes
    let image_bytes: Option<Vec<u8>> = if let Some(prompt) = &prompt {
        println!("Generating image from prompt...");
        let client = pollinations::PollinationsClient::new(&providers)
            .unwrap_or_else(|e| fail(&e.to_string()));
        let generated = client.generate(prompt).unwrap_or_else(|e| fail(&e.to_string()));
        println!("  Image URL: {}", generated.url);
        if image_url.is_none() {
            image_url = Some(generated.url.clone());
        }
        Some(generated.bytes)
    } else if let Some(path) = &input {
        Some(fs::read(path).unwrap_or_else(|e| fail(&format!("Failed to read {path}: {e}"))))
    } else {
        None
    };
    let mime = image_bytes
        .as_deref()
        .and_then(|b| image::guess_format(b).ok())
        .map(|f| f.to_mime_type());

    match provider.as_str() {
        "midas" => {
            let bytes = image_bytes.unwrap_or_else(|| fail("midas needs an input image"));
            let img = image::load_from_memory(&bytes)
                .unwrap_or_else(|e| fail(&format!("Failed to decode image: {e}")));
            println!("Estimating depth locally ({}x{})...", spec.width, spec.height);
            let outcome = midas::estimate_depth(&img, &spec, &midas::MidasConfig::default());
            export_outcome(outcome, &spec, scale, out.as_deref().unwrap_or("relief.obj"));
        }
        "gemini" => {
            let bytes = image_bytes.unwrap_or_else(|| fail("gemini needs an input image"));
            let client = gemini::GeminiClient::new(&providers, gemini::GeminiConfig::default())
                .unwrap_or_else(|e| fail(&e.to_string()));
            println!("Estimating depth via vision model ({}x{})...", spec.width, spec.height);
            let outcome = client
                .estimate_depth(&bytes, mime, &spec)
                .unwrap_or_else(|e| fail(&e.to_string()));
            export_outcome(outcome, &spec, scale, out.as_deref().unwrap_or("relief.obj"));
        }
        "stability" => {
            let bytes = image_bytes.unwrap_or_else(|| fail("stability needs an input image"));
            let client = stability::StabilityClient::new(&providers)
                .unwrap_or_else(|e| fail(&e.to_string()));
            println!("Requesting model from Stability...");
            let asset = client
                .image_to_model(&bytes, mime)
                .unwrap_or_else(|e| fail(&e.to_string()));
            let out = out.as_deref().unwrap_or("model.glb");
            fs::write(out, &asset.bytes)
                .unwrap_or_else(|e| fail(&format!("Failed to write {out}: {e}")));
            println!("Wrote {} ({} bytes, {})", out, asset.bytes.len(), asset.content_type);
        }
        "meshy" => {
            let url = image_url.unwrap_or_else(|| fail("meshy needs --image-url or --prompt"));
            let client =
                meshy::MeshyClient::new(&providers).unwrap_or_else(|e| fail(&e.to_string()));
            println!("Starting Meshy task...");
            let task_id = client.start_task(&url).unwrap_or_else(|e| fail(&e.to_string()));
            println!("  Task {task_id}, polling...");
            let status = client
                .poll(&task_id, POLL_INTERVAL, POLL_DEADLINE)
                .unwrap_or_else(|e| fail(&e.to_string()));
            match (status.status, status.model_urls.glb) {
                (meshy::TaskState::Succeeded, Some(glb_url)) => {
                    let asset = client.download(&glb_url).unwrap_or_else(|e| fail(&e.to_string()));
                    let out = out.as_deref().unwrap_or("model.glb");
                    fs::write(out, &asset.bytes)
                        .unwrap_or_else(|e| fail(&format!("Failed to write {out}: {e}")));
                    println!("Wrote {} ({} bytes)", out, asset.bytes.len());
                }
                (state, _) => fail(&format!("task ended in state {state:?} without a model")),
            }
        }
        other => fail(&format!("unknown provider: {other}")),
    }
}

/// Depth outcome to mesh on disk.
fn export_outcome(outcome: DepthOutcome, spec: &GridSpec, scale: f32, out: &str) {
    if let DepthOutcome::Fallback { reason, .. } = &outcome {
        println!("  Using fallback surface ({reason})");
    }
    let grid = outcome.into_grid();
    let mesh = MeshGeometry::displaced(grid.values(), spec.width, spec.height, scale);
    export::save_mesh(&mesh, out).unwrap_or_else(|e| fail(&e.to_string()));
    println!(
        "Wrote {} ({} vertices, {} triangles)",
        out,
        mesh.vertex_count(),
        mesh.triangle_count()
    );
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}
