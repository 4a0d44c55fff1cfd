//! School domain
//!
//! Students belong to a class and take courses; grades and course links
//! reference students and courses. Deleting a student, class or course
//! removes the rows that depend on it in the same transaction.

use entity_store::{
    CancellationToken, CascadeDelete, DataError, Entity, EntityMapping, MappingRegistryBuilder,
    Repository, SqlConnection, SqlEnum,
};
use sqlx::postgres::PgConnection;

/// Enrollment kind, stored as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, SqlEnum)]
#[repr(i32)]
pub enum StudentType {
    #[default]
    Regular = 0,
    PartTime = 1,
    Exchange = 2,
}

#[derive(Debug, Clone, PartialEq, Default, Entity)]
pub struct Student {
    #[column(name = "StudentID")]
    pub id: i32,
    pub student_name: String,
    pub student_address: String,
    #[column(name = "ClassID")]
    pub class_id: i32,
    /// Maintained by the database
    pub student_number_of_courses: i32,
    /// Maintained by the database
    pub student_sum_of_all_characters: i32,
    pub student_type: StudentType,
}

#[derive(Debug, Clone, PartialEq, Default, Entity)]
pub struct Class {
    #[column(name = "ClassID")]
    pub id: i32,
    pub class_name: String,
    pub class_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Entity)]
pub struct Course {
    #[column(name = "CourseID")]
    pub id: i32,
    pub course_name: String,
    pub course_description: Option<String>,
}

const GRADE_TABLE: &str = "dbo.Grade";
const STUDENT_COURSE_TABLE: &str = "dbo.StudentCourse";
const STUDENT_TABLE: &str = "dbo.Student";
const STUDENTS_OF_CLASS: &str = "StudentID IN (SELECT StudentID FROM dbo.Student WHERE ClassID = @Id)";

/// Add the school mappings to a registry builder
///
/// Only Student needs an explicit mapping; Class and Course follow the
/// default convention.
pub fn register_mappings(builder: MappingRegistryBuilder) -> Result<MappingRegistryBuilder, DataError> {
    builder.register::<Student>(EntityMapping::new(
        STUDENT_TABLE,
        "StudentID",
        ["StudentNumberOfCourses", "StudentSumOfAllCharacters"],
    ))
}

pub fn student_cascade() -> CascadeDelete {
    CascadeDelete::new()
        .table(GRADE_TABLE, "StudentID")
        .table(STUDENT_COURSE_TABLE, "StudentID")
}

pub fn class_cascade() -> CascadeDelete {
    CascadeDelete::new()
        .table_where(GRADE_TABLE, STUDENTS_OF_CLASS)
        .table_where(STUDENT_COURSE_TABLE, STUDENTS_OF_CLASS)
        .table(STUDENT_TABLE, "ClassID")
}

pub fn course_cascade() -> CascadeDelete {
    CascadeDelete::new()
        .table(GRADE_TABLE, "CourseID")
        .table(STUDENT_COURSE_TABLE, "CourseID")
}

/// School operations over one repository
pub struct School<C: SqlConnection = PgConnection> {
    repository: Repository<C>,
}

impl<C: SqlConnection> School<C> {
    pub fn new(repository: Repository<C>) -> Self {
        Self { repository }
    }

    pub fn repository(&mut self) -> &mut Repository<C> {
        &mut self.repository
    }

    pub async fn students(&mut self, cancel: &CancellationToken) -> Result<Vec<Student>, DataError> {
        self.repository.get_all(cancel).await
    }

    pub async fn classes(&mut self, cancel: &CancellationToken) -> Result<Vec<Class>, DataError> {
        self.repository.get_all(cancel).await
    }

    pub async fn courses(&mut self, cancel: &CancellationToken) -> Result<Vec<Course>, DataError> {
        self.repository.get_all(cancel).await
    }

    pub async fn student(&mut self, id: i32, cancel: &CancellationToken) -> Result<Option<Student>, DataError> {
        self.repository.get_by_id(id, cancel).await
    }

    /// Remove a student with their grades and course links
    pub async fn delete_student(&mut self, id: i32, cancel: &CancellationToken) -> Result<u64, DataError> {
        self.repository
            .delete_cascade::<Student>(id, &student_cascade(), cancel)
            .await
    }

    /// Remove a class with its students and everything that references them
    pub async fn delete_class(&mut self, id: i32, cancel: &CancellationToken) -> Result<u64, DataError> {
        self.repository
            .delete_cascade::<Class>(id, &class_cascade(), cancel)
            .await
    }

    /// Remove a course with its grades and student links
    pub async fn delete_course(&mut self, id: i32, cancel: &CancellationToken) -> Result<u64, DataError> {
        self.repository
            .delete_cascade::<Course>(id, &course_cascade(), cancel)
            .await
    }
}
