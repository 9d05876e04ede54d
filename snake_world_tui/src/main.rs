use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use snake_world_core::{
    Position,
    agent::Agent,
    config::{EpsilonSchedule, RunConfig},
    environment::{GridSimulation, Vision},
    perception::absolute_state,
    sarsa::SarsaAgent,
    training::{TickReport, TrainingLoop},
};
use std::{
    io::{self, Stdout},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

const DEFAULT_HEADLESS_EPISODES: u64 = 1000;

#[derive(Parser, Debug)]
#[command(version, about = "SARSA-trained snake", long_about = None)]
struct Args {
    /// JSON run configuration; flags below override it
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Interior board width
    #[arg(long)]
    width: Option<usize>,

    /// Interior board height
    #[arg(long)]
    height: Option<usize>,

    /// Seed for food placement and exploration
    #[arg(long)]
    seed: Option<u64>,

    /// Learning rate
    #[arg(long)]
    alpha: Option<f64>,

    /// Discount factor
    #[arg(long)]
    gamma: Option<f64>,

    /// Constant exploration rate
    #[arg(long)]
    epsilon: Option<f64>,

    /// Play greedily with a frozen table; nothing is saved
    #[arg(long)]
    eval: bool,

    /// Q-table to start from
    #[arg(long, value_name = "FILE", default_value = "sarsa-learned.json")]
    load: PathBuf,

    /// Where the Q-table is written on exit
    #[arg(long, value_name = "FILE", default_value = "sarsa.json")]
    save: PathBuf,

    /// Stop after this many episodes
    #[arg(short, long)]
    episodes: Option<u64>,

    /// Train without the terminal view
    #[arg(long)]
    headless: bool,

    /// Milliseconds between steps in the terminal view
    #[arg(long, default_value_t = 40)]
    tick_ms: u64,
}

impl Args {
    /// Layers the flags over the config file over the defaults.
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if let Some(width) = self.width {
            config.world.width = width;
        }
        if let Some(height) = self.height {
            config.world.height = height;
        }
        if let Some(seed) = self.seed {
            config.world.seed = Some(seed);
            config.sarsa.seed = Some(seed.wrapping_add(1));
        }
        if let Some(alpha) = self.alpha {
            config.sarsa.alpha = alpha;
        }
        if let Some(gamma) = self.gamma {
            config.sarsa.gamma = gamma;
        }
        if let Some(epsilon) = self.epsilon {
            config.sarsa.epsilon = EpsilonSchedule::constant(epsilon);
        }
        if self.eval {
            config.sarsa = config.sarsa.into_evaluation();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

struct App {
    /// Simulation and learner.
    training: TrainingLoop<SarsaAgent>,
    /// Stop after this many finished episodes.
    episode_limit: Option<u64>,
    /// Flag to control the main loop.
    should_quit: bool,
    /// Result of the latest step.
    last_report: Option<TickReport>,
}

impl App {
    fn new(training: TrainingLoop<SarsaAgent>, episode_limit: Option<u64>) -> Self {
        App {
            training,
            episode_limit,
            should_quit: false,
            last_report: None,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        let report = self.training.tick();
        self.last_report = Some(report);
        if let Some(limit) = self.episode_limit {
            if self.training.stats().rounds >= limit {
                self.quit();
            }
        }
    }

    fn toggle_pause(&mut self) {
        self.training.simulation_mut().toggle_pause();
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.run_config()?;

    if args.headless {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(io::stderr)
            .init();
    }

    let evaluating = !config.sarsa.training;
    let mut agent = SarsaAgent::load(config.sarsa.clone(), &args.load)
        .with_context(|| format!("loading Q-table {}", args.load.display()))?;
    if !evaluating {
        agent = agent.save_to(&args.save);
    }
    let simulation = GridSimulation::try_new(&config.world).context("invalid world")?;
    let mut training = TrainingLoop::new(simulation, agent);

    if args.headless {
        let episodes = args.episodes.unwrap_or(DEFAULT_HEADLESS_EPISODES);
        tracing::info!(
            episodes,
            width = config.world.width,
            height = config.world.height,
            evaluating,
            "starting headless run"
        );
        let stop = Arc::new(AtomicBool::new(false));
        let handler_stop = Arc::clone(&stop);
        ctrlc::set_handler(move || handler_stop.store(true, Ordering::Relaxed))
            .context("installing Ctrl-C handler")?;
        let stats = training.run_until_stopped(Some(episodes), &stop);
        tracing::info!(
            rounds = stats.rounds,
            ticks = stats.ticks,
            foods = stats.foods,
            high_score = stats.high_score,
            "run finished"
        );
    } else {
        let mut terminal = setup_terminal()?;
        let mut app = App::new(training, args.episodes);
        let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
        restore_terminal(&mut terminal)?;
        result?;
        training = app.training;
    }

    training
        .shutdown()
        .with_context(|| format!("saving Q-table to {}", args.save.display()))?;
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            app.quit()
                        }
                        KeyCode::Char(' ') => app.toggle_pause(),
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(frame.area());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(main_layout[0]);

    render_map(frame, body[0], app.training.simulation());
    render_status(frame, body[1], app);

    let help_text = Paragraph::new("Space: pause/resume   q, Esc, Ctrl-C: save and quit")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[1]);
}

/// Renders scores, learner state and the snake's local view.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let simulation = app.training.simulation();
    let agent = app.training.agent();
    let stats = app.training.stats();
    let state = absolute_state(simulation);

    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::DarkGray));
    let mut lines = vec![
        Line::from(vec![label("Agent:      "), Span::raw(agent.name())]),
        Line::from(vec![
            label("Score:      "),
            Span::raw(simulation.score().to_string()),
        ]),
        Line::from(vec![
            label("High score: "),
            Span::raw(stats.high_score.to_string()),
        ]),
        Line::from(vec![
            label("Round:      "),
            Span::raw((stats.rounds + 1).to_string()),
        ]),
        Line::from(vec![label("Ticks:      "), Span::raw(stats.ticks.to_string())]),
        Line::from(vec![
            label("Epsilon:    "),
            Span::raw(format!("{:.4}", agent.epsilon())),
        ]),
        Line::from(vec![
            label("States:     "),
            Span::raw(agent.table().len().to_string()),
        ]),
        Line::from(vec![
            label("Heading:    "),
            Span::raw(format!("{:?}", simulation.heading())),
        ]),
        Line::from(vec![label("State:      "), Span::raw(agent.describe_state(&state))]),
    ];
    if let Some(report) = app.last_report {
        lines.push(Line::from(vec![
            label("Outcome:    "),
            Span::raw(format!("{:?}", report.outcome)),
        ]));
    }
    if simulation.is_paused() {
        lines.push(Line::from(Span::styled(
            "PAUSED",
            Style::default().fg(Color::Yellow).bold(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(label("Around the head:")));
    let head = simulation.head();
    for dy in -1..=1 {
        let spans: Vec<Span> = (-1..=1)
            .map(|dx| cell_span(simulation.query_cell(head.offset(dx, dy))))
            .collect();
        lines.push(Line::from(spans));
    }

    let status = Paragraph::new(lines).block(Block::default().title("Status").borders(Borders::ALL));
    frame.render_widget(status, area);
}

/// Renders the board, wall ring included, onto the frame.
fn render_map(frame: &mut Frame, area: Rect, simulation: &GridSimulation) {
    let world = simulation.world();
    let rows = world.height() as i32 + 2;
    let cols = world.width() as i32 + 2;

    let lines: Vec<Line> = (0..rows)
        .map(|y| {
            let spans: Vec<Span> = (0..cols)
                .map(|x| cell_span(simulation.query_cell(Position::new(x, y))))
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Snake World").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

fn cell_span(vision: Vision) -> Span<'static> {
    match vision {
        Vision::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
        Vision::Food => Span::styled("*", Style::default().fg(Color::Yellow).bold()),
        Vision::Body => Span::styled("o", Style::default().fg(Color::Green)),
        Vision::Head => Span::styled("@", Style::default().fg(Color::Red).bold()),
        Vision::Space => Span::raw(" "),
        Vision::OutOfScope => Span::raw("?"),
    }
}
