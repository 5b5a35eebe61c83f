use anyhow::{Result, anyhow};
use bookkeep::Library;
use bookkeep::backend::InMemoryBackend;
use bookkeep::config::LibraryConfig;
use bookkeep::data::{Book, BorrowRecord, Patch, Program, Student, Year};
use bookkeep::search::SearchIndex;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "bookkeep.toml")]
    config: PathBuf,

    /// Path to the store file, overriding the configured one
    #[arg(short, long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage books
    #[command(subcommand)]
    Book(BookCommand),
    /// Manage students
    #[command(subcommand)]
    Student(StudentCommand),
    /// Lend a book to a student
    Borrow {
        book_id: String,
        student_id: String,
        /// Loan start, as YYYY-MM-DD or RFC 3339
        #[arg(long, value_parser = parse_date)]
        from: DateTime<Utc>,
        /// Loan end, as YYYY-MM-DD or RFC 3339
        #[arg(long, value_parser = parse_date)]
        until: DateTime<Utc>,
    },
    /// List borrow records
    Loans {
        /// Only loans whose student id contains this text (case-insensitive)
        #[arg(long)]
        student: Option<String>,
        /// Only loans whose window contains this date
        #[arg(long, value_parser = parse_date)]
        on: Option<DateTime<Utc>>,
    },
    /// Show totals of books, students and active loans
    Dashboard,
}

#[derive(Subcommand)]
enum BookCommand {
    /// Add a new book
    Add {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        quantity: String,
        #[arg(long)]
        image: Option<String>,
    },
    /// Show one book
    Show { id: String },
    /// Change some fields of a book
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Remove a book
    Delete { id: String },
    /// List all books
    List,
}

#[derive(Subcommand)]
enum StudentCommand {
    /// Add a new student
    Add {
        id: String,
        #[arg(long)]
        name: String,
        /// One of "1st Year" to "4th Year"
        #[arg(long)]
        year: String,
        /// Program code, e.g. BSIT
        #[arg(long)]
        program: String,
    },
    /// Show one student
    Show { id: String },
    /// Change some fields of a student
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        program: Option<String>,
    },
    /// Remove a student
    Delete { id: String },
    /// List all students
    List,
}

fn parse_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{raw}' is not a YYYY-MM-DD date"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = LibraryConfig::load(&cli.config)?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    init_tracing(&config.log.filter);

    let backend = InMemoryBackend::load_from_file(&config.store_path)?;
    let library = Library::from_config(Box::new(backend), &config);

    run(&library, cli.command)?;

    save_library(&library, &config.store_path)?;
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn save_library(library: &Library, path: &Path) -> Result<()> {
    library.read_backend(|backend| -> Result<()> {
        // Cast the backend to InMemoryBackend to access save_to_file
        let in_memory_backend = backend
            .as_any()
            .downcast_ref::<InMemoryBackend>()
            .ok_or(anyhow!("Failed to downcast backend to InMemoryBackend"))?;

        in_memory_backend.save_to_file(path)?;
        Ok(())
    })?
}

fn run(library: &Library, command: Commands) -> Result<()> {
    match command {
        Commands::Book(command) => run_book(library, command),
        Commands::Student(command) => run_student(library, command),
        Commands::Borrow {
            book_id,
            student_id,
            from,
            until,
        } => {
            let (id, _) = library.borrow(&book_id, &student_id, from, until)?;
            let book: Book = library.read_entity(&book_id)?;
            println!("Recorded loan {id}; {} copies left", book.quantity);
            Ok(())
        }
        Commands::Loans { student, on } => {
            let records = library.list_borrow_records(None)?;
            let mut found = SearchIndex::new(records).matching(student.as_deref(), on);
            found.sort_by(|a, b| a.1.date_borrow.cmp(&b.1.date_borrow).then(a.0.cmp(&b.0)));
            for (id, record) in &found {
                print_loan(id, record);
            }
            if found.is_empty() {
                println!("No loans found");
            }
            Ok(())
        }
        Commands::Dashboard => {
            let inventory = library.scanner().scan()?;
            let counts = inventory.counts;
            println!("Books:           {}", counts.total_books);
            println!("Students:        {}", counts.total_students);
            println!("Active borrowed: {}", counts.active_borrowed);
            if !inventory.unknown.is_empty() {
                println!("Unrecognized keys: {}", inventory.unknown.join(", "));
            }
            Ok(())
        }
    }
}

fn run_book(library: &Library, command: BookCommand) -> Result<()> {
    match command {
        BookCommand::Add {
            id,
            name,
            author,
            quantity,
            image,
        } => {
            let mut fields = json!({
                "bookName": name,
                "authorName": author,
                "quantity": quantity,
            });
            if let Some(image) = image {
                fields["imageUri"] = json!(image);
            }
            let fields = fields
                .as_object()
                .cloned()
                .ok_or(anyhow!("Book fields must form an object"))?;
            let book: Book = library.create_entity_from_fields(&id, &fields)?;
            println!("Added book {id}: {}", book.book_name);
        }
        BookCommand::Show { id } => {
            let book: Book = library.read_entity(&id)?;
            print_book(&id, &book);
        }
        BookCommand::Update {
            id,
            name,
            author,
            quantity,
            image,
        } => {
            let patch = [
                ("bookName", name),
                ("authorName", author),
                ("quantity", quantity),
                ("imageUri", image),
            ]
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)))
            .fold(Patch::new(), |patch, (field, value)| patch.set(field, value));
            if patch.is_empty() {
                return Err(anyhow!("Nothing to update"));
            }
            let book: Book = library.update_entity(&id, patch)?;
            print_book(&id, &book);
        }
        BookCommand::Delete { id } => {
            library.delete_entity::<Book>(&id)?;
            println!("Deleted book {id}");
        }
        BookCommand::List => {
            let mut books = library.list_books()?;
            books.sort_by(|a, b| a.0.cmp(&b.0));
            for (id, book) in &books {
                print_book(id, book);
            }
        }
    }
    Ok(())
}

fn run_student(library: &Library, command: StudentCommand) -> Result<()> {
    match command {
        StudentCommand::Add {
            id,
            name,
            year,
            program,
        } => {
            let student = Student::new(name, year.parse::<Year>()?, program.parse::<Program>()?);
            library.create_entity(&id, student)?;
            println!("Added student {id}");
        }
        StudentCommand::Show { id } => {
            let student: Student = library.read_entity(&id)?;
            print_student(&id, &student);
        }
        StudentCommand::Update {
            id,
            name,
            year,
            program,
        } => {
            let patch = [("studentName", name), ("year", year), ("program", program)]
                .into_iter()
                .filter_map(|(field, value)| value.map(|v| (field, v)))
                .fold(Patch::new(), |patch, (field, value)| patch.set(field, value));
            if patch.is_empty() {
                return Err(anyhow!("Nothing to update"));
            }
            let student: Student = library.update_entity(&id, patch)?;
            print_student(&id, &student);
        }
        StudentCommand::Delete { id } => {
            library.delete_entity::<Student>(&id)?;
            println!("Deleted student {id}");
        }
        StudentCommand::List => {
            let mut students = library.list_students()?;
            students.sort_by(|a, b| a.0.cmp(&b.0));
            for (id, student) in &students {
                print_student(id, student);
            }
        }
    }
    Ok(())
}

fn print_book(id: &str, book: &Book) {
    println!(
        "{id}\t{}\t{}\t{} available",
        book.book_name, book.author_name, book.quantity
    );
}

fn print_student(id: &str, student: &Student) {
    println!(
        "{id}\t{}\t{}\t{}",
        student.student_name, student.year, student.program
    );
}

fn print_loan(id: &str, record: &BorrowRecord) {
    println!(
        "{id}\tbook {}\tstudent {}\t{} -> {}",
        record.book_id,
        record.student_id,
        record.date_borrow.format("%Y-%m-%d"),
        record.date_return.format("%Y-%m-%d"),
    );
}
