//! Line-oriented story wizard.
//!
//! The wizard walks through the same steps as the web forms. Each input line
//! is one of:
//! - `<field> <value>` to fill in a field on the current step
//! - `next` / `back` to move between steps (`next` validates first)
//! - `#<command>` for story actions (see `#help`)
//!
//! Output lines are tagged (`[STEP]`, `[OK]`, `[INVALID]`, `[ERROR]`, ...)
//! so the wizard can also be driven by scripts.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use story_api::decode_data_url;
use story_core::pages::replace_page;
use story_core::validate::{validate_child_info, validate_story_values, ValidationError};
use story_core::{
    ChildInfoPatch, CustomDescriptionPatch, Gender, GenerationResult, OutputFormat, StoryBackend,
    StoryLength, StorySession, StoryStylePatch, StoryTheme, StoryValuesPatch,
};
use strum::IntoEnumIterator;
use tracing::debug;

/// Steps of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    ChildInfo,
    StoryValues,
    StoryStyle,
    CustomDescription,
    OutputFormat,
    Generate,
    Preview,
}

impl WizardStep {
    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::ChildInfo => "Tell us about your child",
            WizardStep::StoryValues => "Choose the story's values",
            WizardStep::StoryStyle => "Pick a story style",
            WizardStep::CustomDescription => "Add a personal touch",
            WizardStep::OutputFormat => "Choose output formats",
            WizardStep::Generate => "Generate your story",
            WizardStep::Preview => "Your story",
        }
    }

    pub fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ChildInfo => Some(WizardStep::StoryValues),
            WizardStep::StoryValues => Some(WizardStep::StoryStyle),
            WizardStep::StoryStyle => Some(WizardStep::CustomDescription),
            WizardStep::CustomDescription => Some(WizardStep::OutputFormat),
            WizardStep::OutputFormat => Some(WizardStep::Generate),
            WizardStep::Generate => Some(WizardStep::Preview),
            WizardStep::Preview => None,
        }
    }

    pub fn prev(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ChildInfo => None,
            WizardStep::StoryValues => Some(WizardStep::ChildInfo),
            WizardStep::StoryStyle => Some(WizardStep::StoryValues),
            WizardStep::CustomDescription => Some(WizardStep::StoryStyle),
            WizardStep::OutputFormat => Some(WizardStep::CustomDescription),
            WizardStep::Generate => Some(WizardStep::OutputFormat),
            WizardStep::Preview => Some(WizardStep::Generate),
        }
    }

    fn fields(&self) -> &'static [&'static str] {
        match self {
            WizardStep::ChildInfo => &[
                "name <name>",
                "age <years>",
                "gender <boy|girl>",
                "pet <name>",
                "friends <name, name, ...>",
                "description <text>",
            ],
            WizardStep::StoryValues => &["goal <text>", "tag <tag>", "untag <tag>"],
            WizardStep::StoryStyle => &[
                "length <short|medium|long>",
                "theme <adventure|home|school>",
                "islamic <yes|no>",
            ],
            WizardStep::CustomDescription => &["text <anything the story should include>"],
            WizardStep::OutputFormat => &["toggle <format>"],
            WizardStep::Generate => &["generate"],
            WizardStep::Preview => &[],
        }
    }
}

/// What the input loop should do after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The wizard: a session, a backend and the step being shown.
pub struct Wizard<B> {
    session: StorySession,
    backend: B,
    step: WizardStep,
}

impl<B: StoryBackend> Wizard<B> {
    pub fn new(session: StorySession, backend: B) -> Self {
        let step = if session.current_story().is_some() {
            WizardStep::Preview
        } else {
            WizardStep::ChildInfo
        };
        Self {
            session,
            backend,
            step,
        }
    }

    #[cfg(test)]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    #[cfg(test)]
    pub fn session(&self) -> &StorySession {
        &self.session
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Print the banner and the first step.
    pub fn print_intro(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "=== Story Wizard ===")?;
        writeln!(out, "Type #help for commands.")?;
        writeln!(out)?;
        self.print_step(out)
    }

    /// Handle one line of input.
    pub async fn handle_line(&mut self, line: &str, out: &mut dyn Write) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        if let Some(command) = line.strip_prefix('#') {
            return self.handle_command(command.trim(), out).await;
        }

        match line {
            "next" if self.step == WizardStep::Generate => self.generate(out).await?,
            "generate" if self.step == WizardStep::Generate => self.generate(out).await?,
            "next" => self.advance(out)?,
            "back" => self.go_back(out)?,
            _ => self.handle_field(line, out).await?,
        }

        out.flush()?;
        Ok(Flow::Continue)
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    fn advance(&mut self, out: &mut dyn Write) -> Result<()> {
        let errors = self.step_errors();
        if !errors.is_empty() {
            for error in errors {
                writeln!(out, "[INVALID] {}: {}", error.field, error.message)?;
            }
            return Ok(());
        }

        match self.step.next() {
            Some(next) => {
                self.step = next;
                self.print_step(out)?;
            }
            None => writeln!(out, "[ERROR] This is the last step. Use #new to start over.")?,
        }
        Ok(())
    }

    fn go_back(&mut self, out: &mut dyn Write) -> Result<()> {
        match self.step.prev() {
            Some(prev) => {
                self.step = prev;
                self.print_step(out)?;
            }
            None => writeln!(out, "[ERROR] This is the first step")?,
        }
        Ok(())
    }

    fn step_errors(&self) -> Vec<ValidationError> {
        let request = self.session.request();
        match self.step {
            WizardStep::ChildInfo => validate_child_info(&request.child_info),
            WizardStep::StoryValues => validate_story_values(&request.story_values),
            _ => Vec::new(),
        }
    }

    fn print_step(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "[STEP] {}", self.step.title())?;

        let request = self.session.request();
        match self.step {
            WizardStep::ChildInfo => {
                let child = &request.child_info;
                writeln!(out, "  name: {}", child.name)?;
                writeln!(out, "  age: {}", child.age)?;
                writeln!(
                    out,
                    "  gender: {}",
                    child.gender.map(|g| g.to_string()).unwrap_or_default()
                )?;
                writeln!(out, "  pet: {}", child.favourite_pet)?;
                writeln!(out, "  friends: {}", child.friends_name)?;
                writeln!(out, "  description: {}", child.description)?;
            }
            WizardStep::StoryValues => {
                writeln!(out, "  goal: {}", request.story_values.goal)?;
                writeln!(out, "  tags: {}", request.story_values.tags.join(", "))?;
            }
            WizardStep::StoryStyle => {
                let style = &request.story_style;
                writeln!(out, "  length: {}", style.length)?;
                writeln!(out, "  theme: {}", style.theme)?;
                writeln!(out, "  islamic: {}", yes_no(style.islamic_teaching))?;
            }
            WizardStep::CustomDescription => {
                writeln!(
                    out,
                    "  text: {}",
                    request.custom_description.personal_description
                )?;
            }
            WizardStep::OutputFormat => {
                for format in OutputFormat::iter() {
                    let mark = if request.output_format.contains(format) {
                        "x"
                    } else {
                        " "
                    };
                    writeln!(out, "  [{mark}] {format} ({})", format.label())?;
                }
            }
            WizardStep::Generate => {
                writeln!(
                    out,
                    "  A {} {} story for {}",
                    request.story_style.length, request.story_style.theme, request.child_info.name
                )?;
            }
            WizardStep::Preview => {
                self.print_story(out)?;
                return Ok(());
            }
        }

        for field in self.step.fields() {
            writeln!(out, "  > {field}")?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    async fn handle_field(&mut self, line: &str, out: &mut dyn Write) -> Result<()> {
        let (field, value) = match line.split_once(char::is_whitespace) {
            Some((field, value)) => (field, value.trim()),
            None => (line, ""),
        };

        let updated = match (self.step, field) {
            (WizardStep::ChildInfo, "name") => {
                self.session
                    .update_child_info(ChildInfoPatch::default().name(value));
                true
            }
            (WizardStep::ChildInfo, "age") => {
                self.session
                    .update_child_info(ChildInfoPatch::default().age(value));
                true
            }
            (WizardStep::ChildInfo, "gender") => match Gender::from_str(value) {
                Ok(gender) => {
                    self.session
                        .update_child_info(ChildInfoPatch::default().gender(gender));
                    true
                }
                Err(_) => {
                    writeln!(out, "[INVALID] gender: Gender must be boy or girl")?;
                    false
                }
            },
            (WizardStep::ChildInfo, "pet") => {
                self.session
                    .update_child_info(ChildInfoPatch::default().favourite_pet(value));
                true
            }
            (WizardStep::ChildInfo, "friends") => {
                self.session
                    .update_child_info(ChildInfoPatch::default().friends_name(value));
                true
            }
            (WizardStep::ChildInfo, "description") => {
                self.session
                    .update_child_info(ChildInfoPatch::default().description(value));
                true
            }
            (WizardStep::StoryValues, "goal") => {
                self.session
                    .update_story_values(StoryValuesPatch::default().goal(value));
                true
            }
            (WizardStep::StoryValues, "tag") => self.session.add_tag(value),
            (WizardStep::StoryValues, "untag") => self.session.remove_tag(value),
            (WizardStep::StoryStyle, "length") => match StoryLength::from_str(value) {
                Ok(length) => {
                    self.session
                        .update_story_style(StoryStylePatch::default().length(length));
                    true
                }
                Err(_) => {
                    writeln!(out, "[INVALID] length: Choose short, medium or long")?;
                    false
                }
            },
            (WizardStep::StoryStyle, "theme") => match StoryTheme::from_str(value) {
                Ok(theme) => {
                    self.session
                        .update_story_style(StoryStylePatch::default().theme(theme));
                    true
                }
                Err(_) => {
                    writeln!(out, "[INVALID] theme: Choose adventure, home or school")?;
                    false
                }
            },
            (WizardStep::StoryStyle, "islamic") => match parse_yes_no(value) {
                Some(enabled) => {
                    self.session
                        .update_story_style(StoryStylePatch::default().islamic_teaching(enabled));
                    true
                }
                None => {
                    writeln!(out, "[INVALID] islamic: Answer yes or no")?;
                    false
                }
            },
            (WizardStep::CustomDescription, "text") => {
                self.session.update_custom_description(
                    CustomDescriptionPatch::default().personal_description(value),
                );
                true
            }
            (WizardStep::OutputFormat, "toggle") => self.toggle_format(value, out)?,
            _ => {
                writeln!(
                    out,
                    "[ERROR] Unknown input '{field}' on this step. Type #help for help."
                )?;
                false
            }
        };

        if updated {
            self.session.save().await;
            writeln!(out, "[OK] {field} updated")?;
        }
        Ok(())
    }

    fn toggle_format(&mut self, value: &str, out: &mut dyn Write) -> Result<bool> {
        let Ok(format) = OutputFormat::from_str(value) else {
            let known: Vec<String> = OutputFormat::iter().map(|f| f.to_string()).collect();
            writeln!(out, "[INVALID] format: Choose one of {}", known.join(", "))?;
            return Ok(false);
        };

        let mut formats = self.session.request().output_format.clone();
        if !formats.toggle(format) {
            writeln!(out, "[INVALID] format: At least one output format is required")?;
            return Ok(false);
        }
        self.session.update_output_format(formats.iter());
        Ok(true)
    }

    async fn generate(&mut self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "[GENERATING] Writing your story...")?;
        out.flush()?;

        let result = GenerationResult::from(self.session.generate_story(&self.backend).await);
        self.session.save().await;

        match result {
            GenerationResult {
                success: true,
                story: Some(_),
                ..
            } => {
                self.step = WizardStep::Preview;
                self.print_story(out)?;
            }
            GenerationResult { error, .. } => {
                let message = error.unwrap_or_else(|| "Failed to generate story".to_string());
                writeln!(out, "[ERROR] {message}")?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(&mut self, command: &str, out: &mut dyn Write) -> Result<Flow> {
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        debug!(command = name, "wizard command");

        match name {
            "quit" | "exit" => {
                self.session.save().await;
                writeln!(out, "Goodbye!")?;
                return Ok(Flow::Quit);
            }
            "help" => print_command_help(out)?,
            "new" => {
                self.session.reset_story_data();
                self.session.save().await;
                self.step = WizardStep::ChildInfo;
                writeln!(out, "[STATUS] Started a new story")?;
                self.print_step(out)?;
            }
            "recent" => self.print_recent(out)?,
            "open" => self.open_recent(arg, out).await?,
            "pages" => self.print_pages(out)?,
            "edit" => self.edit_page(arg, out).await?,
            "audio" => self.save_audio(arg, out).await?,
            "illustrations" => self.print_illustrations(out).await?,
            "export" => self.export(arg, out).await?,
            _ => writeln!(out, "[ERROR] Unknown command. Type #help for help.")?,
        }

        out.flush()?;
        Ok(Flow::Continue)
    }

    fn print_recent(&self, out: &mut dyn Write) -> Result<()> {
        let recent = self.session.recent_stories();
        if recent.is_empty() {
            writeln!(out, "[RECENT] No recent stories")?;
            return Ok(());
        }

        writeln!(out, "[RECENT]")?;
        for (i, entry) in recent.iter().enumerate() {
            writeln!(
                out,
                "  {}. {} ({})",
                i + 1,
                entry.title(),
                entry.created_at.format("%Y-%m-%d %H:%M")
            )?;
        }
        Ok(())
    }

    async fn open_recent(&mut self, arg: &str, out: &mut dyn Write) -> Result<()> {
        let Some(index) = parse_position(arg) else {
            writeln!(out, "[ERROR] Usage: #open <n>")?;
            return Ok(());
        };

        if self.session.select_recent(index).is_none() {
            writeln!(out, "[ERROR] No recent story {arg}")?;
            return Ok(());
        }

        self.session.save().await;
        self.step = WizardStep::Preview;
        self.print_story(out)
    }

    fn print_story(&self, out: &mut dyn Write) -> Result<()> {
        let Some(story) = self.session.current_story() else {
            writeln!(out, "[ERROR] No story has been generated yet")?;
            return Ok(());
        };

        writeln!(out, "[STORY] {}", story.title)?;
        self.print_pages(out)?;

        let formats: Vec<&str> = story.format.iter().map(|f| f.label()).collect();
        writeln!(out, "[FORMATS] {}", formats.join(", "))?;
        Ok(())
    }

    fn print_pages(&self, out: &mut dyn Write) -> Result<()> {
        let pages = self.session.current_pages();
        if self.session.current_story().is_none() {
            writeln!(out, "[ERROR] No story has been generated yet")?;
            return Ok(());
        }

        let total = pages.len();
        for (i, page) in pages.iter().enumerate() {
            writeln!(out, "[PAGE {}/{}]", i + 1, total)?;
            writeln!(out, "{page}")?;
        }
        Ok(())
    }

    async fn edit_page(&mut self, arg: &str, out: &mut dyn Write) -> Result<()> {
        let (position, text) = match arg.split_once(char::is_whitespace) {
            Some((position, text)) => (position, text.trim()),
            None => (arg, ""),
        };
        let (Some(index), false) = (parse_position(position), text.is_empty()) else {
            writeln!(out, "[ERROR] Usage: #edit <page> <new text>")?;
            return Ok(());
        };

        let Some(story) = self.session.current_story() else {
            writeln!(out, "[ERROR] No story has been generated yet")?;
            return Ok(());
        };

        let Some(content) = replace_page(&story.content, index, text) else {
            writeln!(out, "[ERROR] No page {position}")?;
            return Ok(());
        };

        self.session.update_current_story_content(content);
        self.session.save().await;
        writeln!(out, "[OK] page {position} updated")?;
        Ok(())
    }

    async fn save_audio(&mut self, path: &str, out: &mut dyn Write) -> Result<()> {
        if path.is_empty() {
            writeln!(out, "[ERROR] Usage: #audio <path>")?;
            return Ok(());
        }

        let url = match self.session.narrate_current_story(&self.backend).await {
            Ok(url) => url,
            Err(e) => {
                writeln!(out, "[ERROR] {}", e.user_message())?;
                return Ok(());
            }
        };
        self.session.save().await;

        let Some(audio) = decode_data_url(&url) else {
            writeln!(out, "[AUDIO] {url}")?;
            return Ok(());
        };

        match tokio::fs::write(path, &audio.data).await {
            Ok(()) => writeln!(
                out,
                "[SAVED] {} bytes of {} written to {path}",
                audio.data.len(),
                audio.content_type
            )?,
            Err(e) => writeln!(out, "[ERROR] Could not write {path}: {e}")?,
        }
        Ok(())
    }

    async fn print_illustrations(&self, out: &mut dyn Write) -> Result<()> {
        let images = match self.session.illustrate_current_story(&self.backend).await {
            Ok(images) => images,
            Err(e) => {
                writeln!(out, "[ERROR] {}", e.user_message())?;
                return Ok(());
            }
        };

        writeln!(out, "[ILLUSTRATIONS] {}", images.len())?;
        for (i, image) in images.iter().enumerate() {
            match decode_data_url(image) {
                Some(data) => writeln!(
                    out,
                    "  {}. {} image, {} bytes",
                    i + 1,
                    data.content_type,
                    data.data.len()
                )?,
                None => writeln!(out, "  {}. {image}", i + 1)?,
            }
        }
        Ok(())
    }

    async fn export(&self, path: &str, out: &mut dyn Write) -> Result<()> {
        if path.is_empty() {
            writeln!(out, "[ERROR] Usage: #export <path>")?;
            return Ok(());
        }
        let Some(story) = self.session.current_story() else {
            writeln!(out, "[ERROR] No story has been generated yet")?;
            return Ok(());
        };

        let text = format!("{}\n\n{}\n", story.title, story.content);
        match tokio::fs::write(path, text).await {
            Ok(()) => writeln!(out, "[SAVED] Story exported to {path}")?,
            Err(e) => writeln!(out, "[ERROR] Could not write {path}: {e}")?,
        }
        Ok(())
    }
}

/// Read lines from stdin until `#quit` or end of input.
pub async fn run<B: StoryBackend>(wizard: &mut Wizard<B>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    wizard.print_intro(&mut stdout)?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        if wizard.handle_line(&line, &mut stdout).await? == Flow::Quit {
            return Ok(());
        }
    }

    wizard.session.save().await;
    Ok(())
}

fn print_command_help(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "[HELP]")?;
    writeln!(out, "  next / back           - Move between steps")?;
    writeln!(out, "  <field> <value>       - Fill in a field on this step")?;
    writeln!(out, "  #new                  - Start a new story")?;
    writeln!(out, "  #recent               - List recent stories")?;
    writeln!(out, "  #open <n>             - Show recent story n")?;
    writeln!(out, "  #pages                - Show the current story's pages")?;
    writeln!(out, "  #edit <page> <text>   - Replace a page")?;
    writeln!(out, "  #audio <path>         - Save narration audio to a file")?;
    writeln!(out, "  #illustrations        - Request illustrations")?;
    writeln!(out, "  #export <path>        - Save the story as text")?;
    writeln!(out, "  #help                 - Show this help")?;
    writeln!(out, "  #quit                 - Exit")
}

/// Parse a 1-based position into a 0-based index.
fn parse_position(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()?.checked_sub(1)
}

fn parse_yes_no(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "on" | "true" => Some(true),
        "no" | "n" | "off" | "false" => Some(false),
        _ => None,
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
