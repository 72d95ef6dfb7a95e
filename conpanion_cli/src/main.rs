use chrono::{Local, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use conpanion_core::catalog::seed_food_catalog;
use conpanion_core::history::{recent_sessions, sessions_on};
use conpanion_core::plans;
use conpanion_core::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "conpanion")]
#[command(about = "Fitness and nutrition companion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as this user (overrides the config file)
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the built-in foods to the catalog
    Seed,

    /// Show or edit body metrics
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Show or change the fitness goal
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Food catalog and daily food diary
    Food {
        #[command(subcommand)]
        action: FoodAction,
    },

    /// Manage workout plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Run a live workout
    Workout {
        #[command(subcommand)]
        action: WorkoutAction,
    },

    /// Body weight and photo log
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Completed workout sessions
    History {
        /// Only sessions on this day (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date, conflicts_with = "days")]
        date: Option<NaiveDate>,

        /// Sessions from the last N days
        #[arg(long, default_value_t = 7)]
        days: i64,

        /// Write one CSV row per completed set to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    /// Set age, height, gender and activity level
    Set {
        #[arg(long)]
        age: String,
        /// Height in cm
        #[arg(long)]
        height: String,
        /// male or female
        #[arg(long)]
        gender: String,
        /// none, light, moderate or very-active
        #[arg(long)]
        activity: String,
    },
    /// Set current weight in kg
    Weight { kg: f64 },
}

#[derive(Subcommand)]
enum GoalAction {
    Show,
    /// maintain, bulk or cut
    Set { goal: String },
}

#[derive(Subcommand)]
enum FoodAction {
    /// List the food catalog
    List,
    /// Log a food by catalog name
    Add {
        name: String,
        #[arg(long)]
        grams: f64,
        /// breakfast, lunch, dinner or other
        #[arg(long, default_value = "other")]
        meal: String,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Change the weight or meal of a logged food
    Edit {
        selection_id: String,
        #[arg(long)]
        grams: f64,
        #[arg(long)]
        meal: Option<String>,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Remove a logged food
    Remove {
        selection_id: String,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Show a day's diary and totals
    Today {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    List,
    /// Create a plan from exercises written as "Name:SETSxREPS@KG"
    Create {
        name: String,
        #[arg(long = "exercise", value_parser = parse_exercise)]
        exercises: Vec<PlanExercise>,
    },
    Show { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum WorkoutAction {
    /// Start a live session for a plan
    Start {
        plan_id: String,
        /// Default rest between sets in seconds
        #[arg(long)]
        rest: Option<u32>,
        /// Complete every set at its target without prompting
        #[arg(long)]
        auto: bool,
    },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Record a weigh-in in kg
    Log {
        kg: f64,
        /// URL of a progress photo
        #[arg(long)]
        photo: Option<String>,
    },
    Show {
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("expected a date as YYYY-MM-DD, got '{}'", s))
}

/// Parse "Bench Press:3x8@60"; the weight part is optional
fn parse_exercise(s: &str) -> std::result::Result<PlanExercise, String> {
    let usage = || format!("expected NAME:SETSxREPS[@KG], got '{}'", s);
    let (name, scheme) = s.rsplit_once(':').ok_or_else(usage)?;
    let (counts, weight) = match scheme.split_once('@') {
        Some((counts, weight)) => (counts, weight),
        None => (scheme, "0"),
    };
    let (sets, reps) = counts
        .split_once(['x', 'X'])
        .ok_or_else(usage)?;

    let sets: u32 = sets.trim().parse().map_err(|_| usage())?;
    let reps = types::parse_reps(reps).map_err(|e| e.to_string())?;
    let weight_kg = types::parse_weight_kg(weight).map_err(|e| e.to_string())?;
    if name.trim().is_empty() {
        return Err(usage());
    }

    Ok(PlanExercise {
        name: name.trim().to_string(),
        sets: (1..=sets)
            .map(|number| WorkoutSet {
                number,
                reps,
                weight_kg,
            })
            .collect(),
    })
}

struct App {
    store: SharedStore,
    user: Option<UserId>,
    config: Config,
}

impl App {
    fn require_user(&self) -> Result<&UserId> {
        self.user.as_ref().ok_or_else(|| {
            tracing::warn!("No user configured");
            Error::Unauthenticated
        })
    }

    fn nutrition(&self) -> NutritionEngine {
        NutritionEngine::new(self.store.clone(), self.user.clone())
    }

    fn goals(&self) -> GoalTracker {
        GoalTracker::new(self.store.clone(), self.user.clone())
    }

    fn progress(&self) -> ProgressLog {
        ProgressLog::new(self.store.clone(), self.user.clone())
    }

    /// A plan owned by the active user
    fn user_plan(&self, id: &str) -> Result<Plan> {
        let user = self.require_user()?;
        let plan = plans::get_plan(self.store.as_ref(), id)?;
        if &plan.user != user {
            return Err(Error::NotFound(format!("plan {}", id)));
        }
        Ok(plan)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    conpanion_core::logging::init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.kind() == ErrorKind::Unauthenticated {
                eprintln!("  Pass --user or set [user] id in the config file.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    let user = cli.user.map(UserId::new).or_else(|| config.user_id());

    let app = App {
        store: Arc::new(JsonFileStore::new(data_dir)),
        user,
        config,
    };

    match cli.command {
        Commands::Seed => cmd_seed(&app),
        Commands::Profile { action } => cmd_profile(&app, action),
        Commands::Goal { action } => cmd_goal(&app, action),
        Commands::Food { action } => cmd_food(&app, action),
        Commands::Plan { action } => cmd_plan(&app, action),
        Commands::Workout {
            action:
                WorkoutAction::Start {
                    plan_id,
                    rest,
                    auto,
                },
        } => cmd_workout(&app, &plan_id, rest, auto).await,
        Commands::Progress { action } => cmd_progress(&app, action),
        Commands::History { date, days, export } => cmd_history(&app, date, days, export),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn format_macros(m: &Macros) -> String {
    format!(
        "{} kcal  P {} g  C {} g  F {} g",
        m.calories, m.protein, m.carbs, m.fat
    )
}

fn format_time(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => timestamp.to_string(),
    }
}

fn cmd_seed(app: &App) -> Result<()> {
    let inserted = seed_food_catalog(app.store.as_ref())?;
    println!("✓ Added {} foods to the catalog", inserted);
    Ok(())
}

fn cmd_profile(app: &App, action: ProfileAction) -> Result<()> {
    let tracker = app.goals();
    match action {
        ProfileAction::Show => {
            let profile = tracker.profile()?.unwrap_or_default();
            let show = |v: Option<String>| v.unwrap_or_else(|| "-".into());
            if !profile.full_name.is_empty() {
                println!("Name:     {}", profile.full_name);
            }
            println!("Age:      {}", show(profile.age.map(|a| a.to_string())));
            println!(
                "Height:   {}",
                show(profile.height_cm.map(|h| format!("{} cm", h)))
            );
            println!(
                "Weight:   {}",
                show(profile.weight_kg.map(|w| format!("{} kg", w)))
            );
            println!("Gender:   {}", show(profile.gender.map(|g| format!("{:?}", g))));
            println!(
                "Activity: {}",
                show(profile.activity_level.map(|a| format!("{:?}", a)))
            );
            match tracker.maintenance_calories()? {
                Some(kcal) => println!("Maintenance: {} kcal/day", kcal),
                None => println!("Maintenance: complete your profile to calculate"),
            }
        }
        ProfileAction::Set {
            age,
            height,
            gender,
            activity,
        } => {
            let metrics = MetricsUpdate::parse(&age, &height, &gender, &activity)?;
            let goals = tracker.update_metrics(metrics)?;
            println!("✓ Profile updated");
            print_goals(&goals);
        }
        ProfileAction::Weight { kg } => {
            let goals = tracker.update_weight(kg)?;
            println!("✓ Weight set to {} kg", kg);
            print_goals(&goals);
        }
    }
    Ok(())
}

fn print_goals(goals: &Goals) {
    println!("Goal:     {:?}", goals.fitness_goal);
    match goals.goal_calories {
        Some(kcal) => println!("Calories: {} kcal/day", kcal),
        None => println!("Calories: complete your profile to calculate"),
    }
}

fn cmd_goal(app: &App, action: GoalAction) -> Result<()> {
    let tracker = app.goals();
    match action {
        GoalAction::Show => print_goals(&tracker.goals()?),
        GoalAction::Set { goal } => {
            let goals = tracker.set_fitness_goal(goal.parse()?)?;
            println!("✓ Goal updated");
            print_goals(&goals);
        }
    }
    Ok(())
}

fn cmd_food(app: &App, action: FoodAction) -> Result<()> {
    let engine = app.nutrition();
    match action {
        FoodAction::List => {
            let foods = engine.list_foods()?;
            if foods.is_empty() {
                println!("The food catalog is empty. Run `conpanion seed` to add common foods.");
            }
            for food in foods {
                println!(
                    "{:<24} {:>6.0} kcal  P {:>5.1}  C {:>5.1}  F {:>5.1}  per 100 g  [{}]",
                    food.name, food.calories, food.protein, food.carbs, food.fat, food.id
                );
            }
        }
        FoodAction::Add {
            name,
            grams,
            meal,
            date,
        } => {
            let meal: MealType = meal.parse()?;
            let food = engine.find_food_by_name(&name)?;
            let selection = engine.add_food_selection(date.unwrap_or_else(today), &food, grams, meal)?;
            println!(
                "✓ Added {} g of {} to {}",
                grams,
                food.name,
                meal.label()
            );
            if let Some(macros) = selection.macros {
                println!("  {}", format_macros(&macros));
            }
            println!("  Selection: {}", selection.selection_id);
        }
        FoodAction::Edit {
            selection_id,
            grams,
            meal,
            date,
        } => {
            let day = date.unwrap_or_else(today);
            let meal = match meal {
                Some(meal) => meal.parse()?,
                None => current_meal(&engine, day, &selection_id)?,
            };
            let updated = engine.update_food_selection(day, &selection_id, grams, meal)?;
            println!("✓ Updated selection to {} g ({})", updated.weight, meal.label());
        }
        FoodAction::Remove { selection_id, date } => {
            let removed = engine.remove_food_selection(date.unwrap_or_else(today), &selection_id)?;
            println!("✓ Removed selection ({})", format_macros(&removed));
        }
        FoodAction::Today { date } => print_day(app, &engine, date.unwrap_or_else(today))?,
    }
    Ok(())
}

fn current_meal(engine: &NutritionEngine, day: NaiveDate, selection_id: &str) -> Result<MealType> {
    let intake = engine.day_intake(day)?;
    intake
        .meals
        .iter()
        .find(|(_, items)| items.iter().any(|i| i.selection_id == selection_id))
        .map(|(meal, _)| *meal)
        .ok_or_else(|| Error::NotFound(format!("food selection {}", selection_id)))
}

fn print_day(app: &App, engine: &NutritionEngine, day: NaiveDate) -> Result<()> {
    let intake = engine.day_intake(day)?;
    println!("Food diary for {}", day);
    for (meal, items) in &intake.meals {
        println!();
        println!("{}", meal.label());
        if items.is_empty() {
            println!("  (nothing logged)");
        }
        for item in items {
            println!(
                "  {:<24} {:>6} g  {}  [{}]",
                item.food_name,
                item.weight,
                format_macros(&item.macros),
                item.selection_id
            );
        }
    }

    let totals = engine.daily_macros(day)?;
    let burned = engine.calories_burned_on(day)?;
    println!();
    println!("Total:  {}", format_macros(&totals));
    println!("Burned: {} kcal", burned);
    if let Some(goal) = app.goals().goals()?.goal_calories {
        println!(
            "Goal:   {} kcal ({} remaining)",
            goal,
            goal - totals.calories + burned
        );
    }
    Ok(())
}

fn cmd_plan(app: &App, action: PlanAction) -> Result<()> {
    let store = app.store.as_ref();
    match action {
        PlanAction::List => {
            let user = app.require_user()?;
            let plans = plans::list_plans(store, user)?;
            if plans.is_empty() {
                println!("No plans yet.");
            }
            for plan in plans {
                println!(
                    "{:<24} {} exercises, {} sets  [{}]",
                    plan.name,
                    plan.exercises.len(),
                    plan.total_sets(),
                    plan.id
                );
            }
        }
        PlanAction::Create { name, exercises } => {
            let user = app.require_user()?;
            let id = plans::create_plan(store, user, &name, exercises)?;
            println!("✓ Created plan {}", name.trim());
            println!("  Id: {}", id);
        }
        PlanAction::Show { id } => {
            let plan = app.user_plan(&id)?;
            println!("{}", plan.name);
            for exercise in &plan.exercises {
                println!("  {}", exercise.name);
                for set in &exercise.sets {
                    println!(
                        "    Set {}: {} reps @ {} kg",
                        set.number, set.reps, set.weight_kg
                    );
                }
            }
        }
        PlanAction::Delete { id } => {
            let plan = app.user_plan(&id)?;
            plans::delete_plan(store, &plan.id)?;
            println!("✓ Deleted plan {}", plan.name);
        }
    }
    Ok(())
}

async fn cmd_workout(app: &App, plan_id: &str, rest: Option<u32>, auto: bool) -> Result<()> {
    let plan = app.user_plan(plan_id)?;
    let weight = match app.goals().user_weight()? {
        Some(weight) => weight,
        None => {
            println!("No body weight recorded; calories burned will read 0.");
            0.0
        }
    };
    let rest = rest.unwrap_or(app.config.workout.default_rest_seconds);
    let plan_name = plan.name.clone();

    let session = LiveWorkoutSession::start(plan, weight).with_met(app.config.workout.met_value);
    let mut driver = WorkoutDriver::start_session(app.store.clone(), session, rest)?;
    if driver.state().await == SessionState::AwaitingConfiguration {
        println!("Plan '{}' has no sets; nothing to do.", plan_name);
        return Ok(());
    }

    println!("Starting '{}' with {} s rest", plan_name, rest);
    if auto {
        run_auto(&mut driver).await
    } else {
        run_interactive(&mut driver).await
    }
}

async fn run_auto(driver: &mut WorkoutDriver) -> Result<()> {
    loop {
        let target = driver
            .inspect(|s| s.current_target().cloned())
            .await;
        let Some(target) = target else { break };

        let completion = driver
            .complete_set(SetInput {
                reps: target.reps,
                weight_kg: target.weight_kg,
            })
            .await?;
        print_completion(&completion);
        driver.skip_rest().await?;
    }

    let record = driver.mark_complete(None).await?;
    print_record(&record);
    Ok(())
}

enum WorkoutCommand {
    Status,
    Set(SetInput),
    SkipRest,
    AdjustRest(i64),
    Finish,
    Quit,
}

fn parse_workout_command(line: &str) -> Result<WorkoutCommand> {
    let line = line.trim();
    match line {
        "" => return Ok(WorkoutCommand::Status),
        "s" => return Ok(WorkoutCommand::SkipRest),
        "f" => return Ok(WorkoutCommand::Finish),
        "q" => return Ok(WorkoutCommand::Quit),
        _ => {}
    }

    if line.starts_with('+') || line.starts_with('-') {
        return line
            .parse::<i64>()
            .map(WorkoutCommand::AdjustRest)
            .map_err(|_| Error::InvalidInput(format!("expected +N or -N seconds, got '{}'", line)));
    }

    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        [reps, weight] => Ok(WorkoutCommand::Set(SetInput::parse(reps, weight)?)),
        _ => Err(Error::InvalidInput(format!("unknown command '{}'", line))),
    }
}

fn print_status(snapshot: &SessionSnapshot) {
    match snapshot.state {
        SessionState::ActiveSet => match (&snapshot.exercise_name, &snapshot.target) {
            (Some(name), Some(target)) => println!(
                "{} set {}: target {} reps @ {} kg",
                name, target.number, target.reps, target.weight_kg
            ),
            _ => println!("All sets done. Enter 'f' to finish."),
        },
        SessionState::ActiveRest => println!(
            "Resting: {} of {} s left ('s' to skip, +N/-N to adjust)",
            snapshot.rest_remaining, snapshot.rest_initial
        ),
        _ => {}
    }
    println!(
        "  {}/{} sets  {} s  {} kcal",
        snapshot.completed_sets,
        snapshot.total_sets,
        snapshot.elapsed_seconds,
        snapshot.calories_burned
    );
}

fn print_completion(completion: &SetCompletion) {
    println!(
        "✓ {} set {}: {} reps @ {} kg",
        completion.exercise_name,
        completion.set.number,
        completion.set.reps,
        completion.set.weight_kg
    );
}

fn print_record(record: &WorkoutSessionRecord) {
    println!();
    println!("✓ Workout saved: {}", record.plan_name);
    println!("  Sets:     {}", record.total_sets());
    println!("  Active:   {} s", record.session_seconds);
    println!("  Calories: {} kcal", record.calories_burned);
}

async fn run_interactive(driver: &mut WorkoutDriver) -> Result<()> {
    println!("Enter 'REPS WEIGHT' to complete a set, 's' skip rest, +N/-N adjust rest, 'f' finish, 'q' quit.");
    print_status(&driver.snapshot().await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            driver.quit().await;
            println!("Session abandoned.");
            return Ok(());
        };

        let outcome = match parse_workout_command(&line) {
            Ok(WorkoutCommand::Status) => Ok(()),
            Ok(WorkoutCommand::Set(input)) => driver
                .complete_set(input)
                .await
                .map(|c| print_completion(&c)),
            Ok(WorkoutCommand::SkipRest) => driver.skip_rest().await,
            Ok(WorkoutCommand::AdjustRest(delta)) => {
                let seconds = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
                if delta >= 0 {
                    driver.increase_rest_time(seconds).await
                } else {
                    driver.decrease_rest_time(seconds).await
                }
            }
            Ok(WorkoutCommand::Finish) => match driver.mark_complete(None).await {
                Ok(record) => {
                    print_record(&record);
                    return Ok(());
                }
                Err(e) => Err(e),
            },
            Ok(WorkoutCommand::Quit) => {
                driver.quit().await;
                println!("Session abandoned.");
                return Ok(());
            }
            Err(e) => Err(e),
        };

        // Problems with a single command are shown inline; the session goes on
        if let Err(e) = outcome {
            println!("! {}", e);
            if driver.has_unsaved_record() {
                println!("The workout is finished but not saved. Enter 'f' to retry, 'q' to discard.");
            }
        }
        print_status(&driver.snapshot().await);
    }
}

fn cmd_progress(app: &App, action: ProgressAction) -> Result<()> {
    let log = app.progress();
    match action {
        ProgressAction::Log { kg, photo } => {
            let now = Utc::now();
            let previous = log.most_recent_before(now)?;
            let entry = log.record(kg, photo.as_deref(), now)?;
            println!("✓ Recorded {} kg", entry.weight_kg);
            if let Some(previous) = previous {
                println!(
                    "  Change since last: {:+.1} kg",
                    entry.weight_kg - previous.weight_kg
                );
            }
        }
        ProgressAction::Show { date } => {
            let day = date.unwrap_or_else(today);
            let entries = log.entries_on(day)?;
            if entries.is_empty() {
                println!("No progress recorded on {}.", day);
            }
            for entry in entries {
                print!("{}  {} kg", format_time(entry.timestamp), entry.weight_kg);
                if !entry.picture_url.is_empty() {
                    print!("  {}", entry.picture_url);
                }
                println!();
            }
        }
    }
    Ok(())
}

fn cmd_history(
    app: &App,
    date: Option<NaiveDate>,
    days: i64,
    export: Option<PathBuf>,
) -> Result<()> {
    let user = app.require_user()?;
    let records = match date {
        Some(day) => sessions_on(app.store.as_ref(), user, day)?,
        None => recent_sessions(app.store.as_ref(), user, days)?,
    };

    if records.is_empty() {
        println!("No workouts found.");
    }
    for record in &records {
        println!(
            "{}  {:<20} {} sets  {} s  {} kcal",
            format_time(record.timestamp),
            record.plan_name,
            record.total_sets(),
            record.session_seconds,
            record.calories_burned
        );
    }

    if let Some(path) = export {
        let rows = export_sessions_csv(&records, &path)?;
        println!("✓ Exported {} sets to {}", rows, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exercise() {
        let exercise = parse_exercise("Bench Press:3x8@62.5").unwrap();
        assert_eq!(exercise.name, "Bench Press");
        assert_eq!(exercise.sets.len(), 3);
        assert_eq!(exercise.sets[2].number, 3);
        assert_eq!(exercise.sets[0].reps, 8);
        assert_eq!(exercise.sets[0].weight_kg, 62.5);

        let bodyweight = parse_exercise("Dips:2X12").unwrap();
        assert_eq!(bodyweight.sets[1].weight_kg, 0.0);

        assert!(parse_exercise("Squat").is_err());
        assert!(parse_exercise(":3x5").is_err());
        assert!(parse_exercise("Squat:threex5").is_err());
    }

    #[test]
    fn test_parse_workout_command() {
        assert!(matches!(
            parse_workout_command(" 8 60 ").unwrap(),
            WorkoutCommand::Set(SetInput { reps: 8, .. })
        ));
        assert!(matches!(
            parse_workout_command("+15").unwrap(),
            WorkoutCommand::AdjustRest(15)
        ));
        assert!(matches!(
            parse_workout_command("-10").unwrap(),
            WorkoutCommand::AdjustRest(-10)
        ));
        assert!(matches!(parse_workout_command("").unwrap(), WorkoutCommand::Status));
        assert!(matches!(
            parse_workout_command("eight 60"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            parse_workout_command("jump"),
            Err(Error::InvalidInput(_))
        ));
    }
}
