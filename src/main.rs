use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use contour_tracker::core_modules::image_helper;
use contour_tracker::core_modules::tracker::TrackerState;
use contour_tracker::logging::setup_logging;
use contour_tracker::{PipelineConfig, Result, VisionPipeline};
use serde_json::json;
use tracing::{error, info, warn};

const USAGE: &str =
    "Usage: contour_tracker <output_dir> <frame.png>... [--config <file.json>] [--state <file.json>]";

struct Options {
    output_dir: PathBuf,
    frames: Vec<PathBuf>,
    config: Option<PathBuf>,
    state: Option<PathBuf>,
}

impl Options {
    fn parse(args: &[String]) -> Option<Self> {
        let mut positional = Vec::new();
        let mut config = None;
        let mut state = None;
        let mut args = args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(args.next()?)),
                "--state" => state = Some(PathBuf::from(args.next()?)),
                _ => positional.push(PathBuf::from(arg)),
            }
        }
        if positional.len() < 2 {
            return None;
        }
        let output_dir = positional.remove(0);
        Some(Self {
            output_dir,
            frames: positional,
            config,
            state,
        })
    }
}

fn main() -> ExitCode {
    if let Err(e) = setup_logging("info") {
        eprintln!("{e}");
    }

    // --- 1. Argument Parsing ---
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(options) = Options::parse(&args) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "Run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> Result<()> {
    // --- 2. Pipeline Initialization ---
    let config = match &options.config {
        Some(path) => PipelineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    let state = match &options.state {
        Some(path) if path.exists() => TrackerState::from_json(&std::fs::read_to_string(path)?)?,
        _ => TrackerState::default(),
    };
    let mut pipeline = VisionPipeline::with_state(config, state)?;
    std::fs::create_dir_all(&options.output_dir)?;

    // --- 3. Main Processing Loop ---
    for (index, path) in options.frames.iter().enumerate() {
        let frame = match image_helper::load(path) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(path = %path.display(), %error, "Skipping unreadable frame");
                continue;
            }
        };

        let report = pipeline.process(&frame);

        // --- 4. Output ---
        let output = output_path(&options.output_dir, index, path);
        image_helper::save(&output, &report.annotated)?;
        let line = json!({
            "frame": path.display().to_string(),
            "annotated": output.display().to_string(),
            "discarded": report.discarded,
            "objects": report.descriptors,
        });
        println!("{}", serde_json::to_string(&line)?);
    }

    if let Some(path) = &options.state {
        std::fs::write(path, pipeline.tracker_state().to_json()?)?;
    }
    info!(
        frames = pipeline.frames_processed(),
        next_identifier = pipeline.tracker_state().next_identifier(),
        "Processing complete. Output saved to {}",
        options.output_dir.display()
    );
    Ok(())
}

fn output_path(output_dir: &Path, index: usize, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    output_dir.join(format!("{index:05}_{stem}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contour_tracker::core_modules::frame::{ChannelLayout, Frame};

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("contour_tracker_runner_{}_{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).expect("Error Creating Directory.");
        dir
    }

    fn square_png(dir: &Path, name: &str, left: u32) -> PathBuf {
        let mut frame = Frame::filled(64, 64, ChannelLayout::Rgba8, [0, 0, 0]);
        for y in 20..40 {
            for x in left..left + 20 {
                frame.set_rgb(x, y, [255, 255, 255]);
            }
        }
        let path = dir.join(name);
        image_helper::save(&path, &frame).expect("Error Saving File.");
        path
    }

    #[test]
    fn flags_may_appear_anywhere() {
        let options = Options::parse(&args(&[
            "--config", "c.json", "out", "a.png", "--state", "s.json", "b.png",
        ]))
        .unwrap();
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert_eq!(options.frames, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert_eq!(options.config, Some(PathBuf::from("c.json")));
        assert_eq!(options.state, Some(PathBuf::from("s.json")));
    }

    #[test]
    fn flag_without_value_is_rejected() {
        assert!(Options::parse(&args(&["out", "a.png", "--config"])).is_none());
        assert!(Options::parse(&args(&["out", "a.png", "--state"])).is_none());
    }

    #[test]
    fn output_dir_and_one_frame_are_required() {
        assert!(Options::parse(&args(&[])).is_none());
        assert!(Options::parse(&args(&["out"])).is_none());
        assert!(Options::parse(&args(&["out", "--config", "c.json"])).is_none());
        assert!(Options::parse(&args(&["out", "a.png"])).is_some());
    }

    #[test]
    fn output_files_are_numbered_by_input_position() {
        let dir = Path::new("out");
        assert_eq!(
            output_path(dir, 3, Path::new("frames/cam_a.png")),
            dir.join("00003_cam_a.png")
        );
        assert_eq!(output_path(dir, 0, Path::new("")), dir.join("00000_frame.png"));
    }

    #[test]
    fn run_skips_unreadable_frames_and_carries_state_across_runs() {
        let dir = scratch_dir("session");
        let first = square_png(&dir, "first.png", 20);
        let second = square_png(&dir, "second.png", 24);
        let state = dir.join("state.json");
        let output_dir = dir.join("out");
        std::fs::remove_file(&state).ok();

        let options = Options {
            output_dir: output_dir.clone(),
            frames: vec![first.clone(), dir.join("missing.png"), second.clone()],
            config: None,
            state: Some(state.clone()),
        };
        run(&options).expect("run succeeds despite a missing frame");

        assert!(output_path(&output_dir, 0, &first).exists());
        assert!(!output_path(&output_dir, 1, &dir.join("missing.png")).exists());
        assert!(output_path(&output_dir, 2, &second).exists());
        let saved = TrackerState::from_json(&std::fs::read_to_string(&state).unwrap()).unwrap();
        assert_eq!(saved.next_identifier(), 2);
        assert_eq!(saved.objects().len(), 1);

        // The saved state is restored, so the same square keeps identifier 1.
        let again = Options {
            frames: vec![second.clone()],
            ..options
        };
        run(&again).unwrap();
        let restored = TrackerState::from_json(&std::fs::read_to_string(&state).unwrap()).unwrap();
        assert_eq!(restored.next_identifier(), 2);
        assert_eq!(restored.get(1).unwrap().frames_since_seen, 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn invalid_config_file_fails_the_run() {
        let dir = scratch_dir("bad_config");
        let config = dir.join("config.json");
        std::fs::write(&config, r#"{ "stroke_width": 0 }"#).unwrap();
        let options = Options {
            output_dir: dir.join("out"),
            frames: vec![square_png(&dir, "frame.png", 10)],
            config: Some(config),
            state: None,
        };

        assert!(run(&options).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
