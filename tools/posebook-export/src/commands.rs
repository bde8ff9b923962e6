//! Subcommand implementations
//!
//! Every command loads a book, edits or converts it, and writes it back. The
//! output path defaults to the input (in-place edit) for editing commands.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use posebook_core::{Armature, CleanOptions, Placement, Pose, PoseBook, Renamer, blend};
use std::path::Path;

use crate::config::{Config, load_config};
use crate::io::{BookFormat, load_book, load_rig, save_book, save_rig};

/// Settings shared by every command: the TOML config and an optional rig
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub config: Config,
    pub rig: Option<Armature>,
}

impl Settings {
    pub fn load(config: Option<&Path>, rig: Option<&Path>) -> Result<Self> {
        Ok(Self {
            config: load_config(config)?,
            rig: rig.map(load_rig).transpose()?,
        })
    }

    pub fn rig(&self) -> Option<&Armature> {
        self.rig.as_ref()
    }

    fn require_rig(&self, command: &str) -> Result<&Armature> {
        self.rig
            .as_ref()
            .with_context(|| format!("'{}' needs a rig (pass --rig)", command))
    }

    fn open_book(&self, path: &Path, format: Option<BookFormat>) -> Result<(PoseBook, BookFormat)> {
        let format = BookFormat::resolve(format, path)?;
        let book = load_book(path, format, self.rig(), &self.config)?;
        Ok((book, format))
    }
}

/// Where `capture` puts the new pose
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PlacementArg {
    /// After the active pose
    Insert,
    #[default]
    Append,
    Prepend,
}

impl From<PlacementArg> for Placement {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::Insert => Placement::Insert,
            PlacementArg::Append => Placement::Append,
            PlacementArg::Prepend => Placement::Prepend,
        }
    }
}

/// Parse `NAME=WEIGHT`
pub fn parse_weight(s: &str) -> Result<(String, f64), String> {
    let (name, weight) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=WEIGHT, got '{s}'"))?;
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|_| format!("invalid weight '{weight}'"))?;
    if !weight.is_finite() {
        return Err(format!("invalid weight '{weight}'"));
    }
    Ok((name.to_string(), weight))
}

/// Convert a book between formats
pub fn convert(
    settings: &Settings,
    input: &Path,
    from: Option<BookFormat>,
    output: &Path,
    to: Option<BookFormat>,
    pose: Option<&str>,
) -> Result<()> {
    let (book, from) = settings.open_book(input, from)?;
    let to = BookFormat::resolve(to, output)?;
    tracing::info!("Converting {:?} ({:?}) -> {:?} ({:?})", input, from, output, to);
    save_book(output, to, &book, settings.rig(), &settings.config, pose)
}

/// Human-readable listing of a book
pub fn describe(book: &PoseBook) -> String {
    let mut out = format!("PoseBook '{}' ({} poses)\n", book.name(), book.len());
    for (index, pose) in book.poses().iter().enumerate() {
        let alt = if pose.name_alt.is_empty() {
            String::new()
        } else {
            format!(" ({})", pose.name_alt)
        };
        out.push_str(&format!(
            "  [{}] {}{} category={} bones={}\n",
            index,
            pose.name(),
            alt,
            pose.category,
            pose.bone_count()
        ));
    }
    out
}

pub fn info(settings: &Settings, input: &Path, format: Option<BookFormat>) -> Result<()> {
    let (book, _) = settings.open_book(input, format)?;
    print!("{}", describe(&book));
    Ok(())
}

/// Guess categories from pose names
pub fn categorize(
    settings: &Settings,
    input: &Path,
    format: Option<BookFormat>,
    output: Option<&Path>,
    missing_only: bool,
) -> Result<()> {
    let (mut book, format) = settings.open_book(input, format)?;
    if missing_only {
        book.guess_missing_categories();
    } else {
        book.auto_set_categories();
    }
    let output = output.unwrap_or(input);
    tracing::info!("Categorized {} poses -> {:?}", book.len(), output);
    save_book(output, format, &book, settings.rig(), &settings.config, None)
}

/// Drop bones the rig lacks or that carry no deformation
pub fn clean(
    settings: &Settings,
    input: &Path,
    format: Option<BookFormat>,
    output: Option<&Path>,
    threshold: Option<f64>,
    report_only: bool,
) -> Result<()> {
    let rig = settings.require_rig("clean")?;
    let (mut book, format) = settings.open_book(input, format)?;

    let mut options: CleanOptions = settings.config.clean();
    if let Some(threshold) = threshold {
        options.threshold = threshold;
    }
    options.report_only = report_only;

    let report = book.clean_poses(rig, &options);
    for entry in &report {
        println!("{}: {} - {}", entry.pose, entry.bone, entry.reason);
    }
    tracing::info!("{} bone(s) flagged", report.len());

    if report_only {
        return Ok(());
    }
    save_book(output.unwrap_or(input), format, &book, settings.rig(), &settings.config, None)
}

/// Blend weighted poses onto the rig; `output` receives the posed rig
#[allow(clippy::too_many_arguments)]
pub fn blend_onto_rig(
    settings: &Settings,
    input: &Path,
    format: Option<BookFormat>,
    weights: &[(String, f64)],
    solo: Option<&str>,
    reset: bool,
    output: Option<&Path>,
) -> Result<()> {
    let mut rig = settings.require_rig("blend")?.clone();
    let (mut book, _) = settings.open_book(input, format)?;

    if let Some(name) = solo {
        let index = book
            .position_of(name)
            .with_context(|| format!("Pose '{}' not found in '{}'", name, book.name()))?;
        book.solo_weight(Some(index));
    }
    for (name, weight) in weights {
        let book_name = book.name().to_string();
        match book.pose_by_name_mut(name) {
            Some(pose) => pose.weight = *weight,
            None => bail!("Pose '{}' not found in '{}'", name, book_name),
        }
    }

    let result = blend(&book);
    for bone in result.bones() {
        let t = &bone.transform;
        println!(
            "{}: location={:?} rotation={:?} scale={:?}",
            bone.name,
            t.location().to_array(),
            t.rotation_wxyz(),
            t.scale().to_array()
        );
    }

    book.apply_poses(&mut rig, reset);
    if let Some(output) = output {
        save_rig(output, &rig)?;
        tracing::info!("Saved posed rig to {:?}", output);
    }
    Ok(())
}

/// Batch search / replace over pose or bone names
#[allow(clippy::too_many_arguments)]
pub fn rename(
    settings: &Settings,
    input: &Path,
    format: Option<BookFormat>,
    output: Option<&Path>,
    search: &str,
    replace: &str,
    regex: bool,
    bones: bool,
) -> Result<()> {
    let renamer = Renamer::new(search, replace, regex)?;
    let (mut book, format) = settings.open_book(input, format)?;

    let outcomes = if bones {
        book.rename_bones(&renamer)
    } else {
        book.rename_poses(&renamer)?
    };
    for outcome in &outcomes {
        let note = if outcome.conflicted { " (naming conflict)" } else { "" };
        println!("{} -> {}{}", outcome.from, outcome.to, note);
    }
    tracing::info!("Renamed {} name(s)", outcomes.len());
    save_book(output.unwrap_or(input), format, &book, settings.rig(), &settings.config, None)
}

/// Capture the rig's current pose into a book, creating the book file if it
/// doesn't exist yet
pub fn capture(
    settings: &Settings,
    book_path: &Path,
    format: Option<BookFormat>,
    name: &str,
    placement: PlacementArg,
) -> Result<()> {
    let mut rig = settings.require_rig("capture")?.clone();
    let format = BookFormat::resolve(format, book_path)?;
    let mut book = if book_path.exists() {
        load_book(book_path, format, Some(&rig), &settings.config)?
    } else {
        let name = book_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        PoseBook::new(name)
    };

    let index = book.add_pose_from_rig(
        Pose::new(name),
        &mut rig,
        &settings.config.capture(),
        placement.into(),
    );
    let pose = &book.poses()[index];
    tracing::info!(
        "Captured pose '{}' with {} bones at index {}",
        pose.name(),
        pose.bone_count(),
        index
    );
    save_book(book_path, format, &book, Some(&rig), &settings.config, None)
}
