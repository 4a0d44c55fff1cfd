//! Integration tests against a live PostgreSQL database
//!
//! These tests are ignored by default. Run them with
//! `DATABASE_URL=postgres://... cargo test -- --ignored --test-threads=1`;
//! every test recreates the `dbo` schema.

use datahaus::prelude::*;
use datahaus::school::{self, School};

const SCHEMA_SQL: &[&str] = &[
    "DROP SCHEMA IF EXISTS dbo CASCADE",
    "CREATE SCHEMA dbo",
    r#"CREATE TABLE dbo.Class (
        ClassID SERIAL PRIMARY KEY,
        ClassName TEXT NOT NULL,
        ClassDescription TEXT
    )"#,
    r#"CREATE TABLE dbo.Course (
        CourseID SERIAL PRIMARY KEY,
        CourseName TEXT NOT NULL,
        CourseDescription TEXT
    )"#,
    r#"CREATE TABLE dbo.Student (
        StudentID SERIAL PRIMARY KEY,
        StudentName TEXT NOT NULL,
        StudentAddress TEXT NOT NULL,
        ClassID INT NOT NULL REFERENCES dbo.Class (ClassID),
        StudentNumberOfCourses INT NOT NULL DEFAULT 0,
        StudentSumOfAllCharacters INT NOT NULL DEFAULT 0,
        StudentType INT NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE dbo.StudentCourse (
        StudentID INT NOT NULL REFERENCES dbo.Student (StudentID),
        CourseID INT NOT NULL REFERENCES dbo.Course (CourseID)
    )"#,
    r#"CREATE TABLE dbo.Grade (
        StudentID INT NOT NULL REFERENCES dbo.Student (StudentID),
        CourseID INT NOT NULL REFERENCES dbo.Course (CourseID),
        Value NUMERIC(4, 2) NOT NULL
    )"#,
];

const SEED_SQL: &[&str] = &[
    "INSERT INTO dbo.Class (ClassName) VALUES ('1A')",
    "INSERT INTO dbo.Course (CourseName, CourseDescription) VALUES ('Maths', 'Algebra and geometry')",
    "INSERT INTO dbo.Student (StudentName, StudentAddress, ClassID, StudentType) VALUES ('Mia', 'Elm Street 4', 1, 2)",
    "INSERT INTO dbo.StudentCourse (StudentID, CourseID) VALUES (1, 1)",
    "INSERT INTO dbo.Grade (StudentID, CourseID, Value) VALUES (1, 1, 1.75)",
];

async fn setup() -> School {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for integration tests");

    let registry = school::register_mappings(MappingRegistry::builder())
        .unwrap()
        .build();
    let haus: DataHaus = DataHaus::new(database_url, registry).unwrap();
    let cancel = CancellationToken::new();
    haus.health_check(&cancel)
        .await
        .expect("Failed to connect to database");

    let mut repository = haus.repository().unwrap();
    let statements: Vec<Statement> = SCHEMA_SQL
        .iter()
        .chain(SEED_SQL)
        .map(|sql| Statement::new(*sql))
        .collect();
    repository
        .executor_mut()
        .execute_batch_in_transaction(&statements, &cancel)
        .await
        .expect("Failed to create schema");

    School::new(repository)
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_live_read_and_update() {
    let mut school = setup().await;
    let cancel = CancellationToken::new();

    let mut student = school.student(1, &cancel).await.unwrap().unwrap();
    assert_eq!(student.student_name, "Mia");
    assert_eq!(student.student_type, StudentType::Exchange);

    student.student_address = "Oak Avenue 9".into();
    student.student_number_of_courses = 42;
    let updated = school.repository().update(&student, &cancel).await.unwrap();
    assert_eq!(updated, 1);

    let reloaded = school.student(1, &cancel).await.unwrap().unwrap();
    assert_eq!(reloaded.student_address, "Oak Avenue 9");
    assert_eq!(reloaded.student_number_of_courses, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_live_null_description_round_trip() {
    let mut school = setup().await;
    let cancel = CancellationToken::new();

    let class = Class {
        id: 0,
        class_name: "2B".into(),
        class_description: None,
    };
    school.repository().insert(&class, &cancel).await.unwrap();

    let classes = school.classes(&cancel).await.unwrap();
    let inserted = classes.iter().find(|c| c.class_name == "2B").unwrap();
    // None is written as '' and so reads back as Some("")
    assert_eq!(inserted.class_description.as_deref(), Some(""));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_live_failed_cascade_is_not_observable() {
    let mut school = setup().await;
    let cancel = CancellationToken::new();

    // dbo.StudentCourse still references the course, so the last statement fails
    let failing = CascadeDelete::new().table("dbo.Grade", "StudentID");
    let err = school
        .repository()
        .delete_cascade::<Course>(1, &failing, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Batch { .. }));

    let all: Vec<Course> = school.repository().get_all(&cancel).await.unwrap();
    assert_eq!(all.len(), 1);

    let removed = school.delete_course(1, &cancel).await.unwrap();
    assert_eq!(removed, 3);
    assert!(school.courses(&cancel).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_live_delete_student() {
    let mut school = setup().await;
    let cancel = CancellationToken::new();

    let removed = school.delete_student(1, &cancel).await.unwrap();
    assert_eq!(removed, 3);
    assert!(school.student(1, &cancel).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_live_unreadable_column_type_is_an_error() {
    let mut school = setup().await;
    let cancel = CancellationToken::new();
    let executor = school.repository().executor_mut();

    let err = executor
        .query_rows(&Statement::new("SELECT CAST('12:30' AS TIME) AS StartsAt"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Mapping(msg) if msg.contains("startsat")));

    let rows = executor
        .query_rows(&Statement::new("SELECT CAST(NULL AS TIME) AS StartsAt"), &cancel)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].value(0).is_none());
}
