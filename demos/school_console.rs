//! # School Console
//!
//! Lists the school database and runs the cascading deletes:
//!
//! ```text
//! cargo run --example school_console
//! cargo run --example school_console -- delete-student 7
//! cargo run --example school_console -- delete-class 2
//! cargo run --example school_console -- delete-course 3
//! ```
//!
//! The connection string and mappings come from `datahaus.toml` or the file
//! named by `DATAHAUS_CONFIG`; `demos/datahaus.toml` is a starting point.

use anyhow::{Context, bail};
use datahaus::prelude::*;
use datahaus::school::{self, School};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("🏫 DataHaus School Console");
    println!("==========================");

    let builder = school::register_mappings(MappingRegistry::builder())?;
    let haus: DataHaus = DataHaus::load(builder).context("loading configuration")?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    haus.health_check(&cancel)
        .await
        .context("database is not reachable")?;
    println!("✅ Connected");

    let mut school = School::new(haus.repository()?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {}
        [command, id] => {
            let id: i32 = id.parse().with_context(|| format!("invalid id '{}'", id))?;
            let removed = match command.as_str() {
                "delete-student" => school.delete_student(id, &cancel).await?,
                "delete-class" => school.delete_class(id, &cancel).await?,
                "delete-course" => school.delete_course(id, &cancel).await?,
                other => bail!("unknown command '{}'", other),
            };
            println!("🗑️  {} removed {} rows", command, removed);
        }
        _ => bail!("usage: school_console [delete-student|delete-class|delete-course <id>]"),
    }

    println!("\n📚 Classes");
    for class in school.classes(&cancel).await? {
        println!("  {:>4}  {}", class.id, class.class_name);
    }

    println!("\n🎓 Students");
    for student in school.students(&cancel).await? {
        println!(
            "  {:>4}  {:<24} class {:>3}  {:?}, {} courses",
            student.id,
            student.student_name,
            student.class_id,
            student.student_type,
            student.student_number_of_courses
        );
    }

    println!("\n📖 Courses");
    for course in school.courses(&cancel).await? {
        println!(
            "  {:>4}  {}  {}",
            course.id,
            course.course_name,
            course.course_description.unwrap_or_default()
        );
    }

    school.repository().close().await?;
    Ok(())
}
