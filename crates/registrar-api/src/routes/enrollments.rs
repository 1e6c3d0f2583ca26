//! Routes for enrollment workflows and grade/roster queries.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use registrar_core::error::EnrollmentError;
use registrar_core::ids::{CourseId, StudentId};
use registrar_enrollment::application::query_handlers::{
    self, CourseOccupancyView, CourseRosterView, EnrollmentView,
};
use registrar_enrollment::application::reconciler::{OccupancyRepair, ReconcileReport};
use registrar_enrollment::domain::commands;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the client's idempotency key for enroll requests.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Request body for POST / and POST /withdraw.
#[derive(Debug, Deserialize)]
pub struct EnrollmentRequest {
    /// The course.
    pub course_id: String,
    /// The student.
    pub student_id: String,
}

/// Request body for PUT /{id}/grade.
#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    /// Grade in `[0, 100]`.
    pub grade: f64,
}

/// Request body for PUT /{id}/status.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// Target status name, case-insensitive.
    pub status: String,
}

/// Request body for PUT /courses/{course_id}/grades.
#[derive(Debug, Deserialize)]
pub struct BatchGradesRequest {
    /// Grades keyed by student identifier.
    pub grades: BTreeMap<String, f64>,
}

/// Response body for POST /withdraw.
#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    /// Whether an active enrollment was withdrawn.
    pub withdrawn: bool,
}

/// Response body for DELETE /{id}.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    /// Whether a record existed.
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchGradesResponse {
    pub updated: usize,
}

/// Response body for the count queries.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct AverageGradeResponse {
    pub student_id: String,
    pub average_grade: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct StudentGradeResponse {
    pub student_id: String,
    pub course_id: String,
    pub grade: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct EnrolledResponse {
    pub student_id: String,
    pub course_id: String,
    pub enrolled: bool,
}

fn idempotency_key(headers: &HeaderMap) -> Result<Uuid, EnrollmentError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(Uuid::new_v4());
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
        .ok_or_else(|| EnrollmentError::Validation("Idempotency-Key must be a UUID".to_owned()))
}

/// POST /
#[instrument(skip(state, headers, request), fields(course_id = %request.course_id, student_id = %request.student_id))]
async fn enroll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<EnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentView>), ApiError> {
    let command = commands::EnrollStudent {
        correlation_id: Uuid::new_v4(),
        idempotency_key: idempotency_key(&headers)?,
        course_id: CourseId::new(&request.course_id)?,
        student_id: StudentId::new(&request.student_id)?,
    };

    info!(correlation_id = %command.correlation_id, "handling enroll command");

    let record = state.coordinator.enroll(&command).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// POST /withdraw
#[instrument(skip(state, request), fields(course_id = %request.course_id, student_id = %request.student_id))]
async fn withdraw(
    State(state): State<AppState>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<Json<WithdrawResponse>, ApiError> {
    let command = commands::WithdrawStudent {
        correlation_id: Uuid::new_v4(),
        course_id: CourseId::new(&request.course_id)?,
        student_id: StudentId::new(&request.student_id)?,
    };

    info!(correlation_id = %command.correlation_id, "handling withdraw command");

    let withdrawn = state.coordinator.withdraw(&command).await?;
    Ok(Json(WithdrawResponse { withdrawn }))
}

/// PUT /{id}/grade
#[instrument(skip(state, request))]
async fn update_grade(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
    Json(request): Json<GradeRequest>,
) -> Result<Json<EnrollmentView>, ApiError> {
    let command = commands::UpdateGrade {
        correlation_id: Uuid::new_v4(),
        enrollment_id,
        grade: request.grade,
    };
    let record = state.coordinator.update_grade(&command).await?;
    Ok(Json(record.into()))
}

/// PUT /{id}/status
#[instrument(skip(state, request))]
async fn update_status(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<EnrollmentView>, ApiError> {
    let command = commands::UpdateStatus {
        correlation_id: Uuid::new_v4(),
        enrollment_id,
        status: request.status.parse()?,
    };
    let record = state.coordinator.update_status(&command).await?;
    Ok(Json(record.into()))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_enrollment(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let command = commands::DeleteEnrollment {
        correlation_id: Uuid::new_v4(),
        enrollment_id,
    };
    let deleted = state.coordinator.delete_enrollment(&command).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// PUT /courses/{course_id}/grades
#[instrument(skip(state, request))]
async fn batch_update_grades(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
    Json(request): Json<BatchGradesRequest>,
) -> Result<Json<BatchGradesResponse>, ApiError> {
    let grades = request
        .grades
        .into_iter()
        .map(|(student, grade)| StudentId::new(student).map(|id| (id, grade)))
        .collect::<Result<BTreeMap<_, _>, EnrollmentError>>()?;
    let command = commands::BatchUpdateGrades {
        correlation_id: Uuid::new_v4(),
        course_id: CourseId::new(&course_id)?,
        grades,
    };
    let updated = state.coordinator.batch_update_grades(&command).await?;
    Ok(Json(BatchGradesResponse { updated }))
}

/// GET /
async fn list_enrollments(
    State(state): State<AppState>,
) -> Result<Json<Vec<EnrollmentView>>, ApiError> {
    let views = query_handlers::list_enrollments(&*state.repository).await?;
    Ok(Json(views))
}

/// GET /count
async fn total_enrollments(
    State(state): State<AppState>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = query_handlers::total_enrollments(&*state.repository).await?;
    Ok(Json(CountResponse { count }))
}

/// GET /{id}
async fn get_enrollment(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
) -> Result<Json<EnrollmentView>, ApiError> {
    let view = query_handlers::get_enrollment(enrollment_id, &*state.repository).await?;
    Ok(Json(view))
}

/// GET /status/{status}
async fn list_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<Vec<EnrollmentView>>, ApiError> {
    let views = query_handlers::list_by_status(&status, &*state.repository).await?;
    Ok(Json(views))
}

/// GET /courses/{course_id}
async fn list_by_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<Vec<EnrollmentView>>, ApiError> {
    let course_id = CourseId::new(&course_id)?;
    let views = query_handlers::list_by_course(&course_id, &*state.repository).await?;
    Ok(Json(views))
}

/// GET /courses/{course_id}/roster
async fn course_roster(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseRosterView>, ApiError> {
    let course_id = CourseId::new(&course_id)?;
    let roster = query_handlers::course_roster(&course_id, &*state.repository).await?;
    Ok(Json(roster))
}

/// GET /courses/{course_id}/active-count
async fn active_count_by_course(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<CountResponse>, ApiError> {
    let course_id = CourseId::new(&course_id)?;
    let count = query_handlers::active_count_by_course(&course_id, &*state.repository).await?;
    Ok(Json(CountResponse { count }))
}

/// GET /courses/{course_id}/occupancy
async fn course_occupancy(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseOccupancyView>, ApiError> {
    let course_id = CourseId::new(&course_id)?;
    let view =
        query_handlers::course_occupancy(&course_id, &*state.repository, &*state.catalog).await?;
    Ok(Json(view))
}

/// POST /courses/{course_id}/repair
#[instrument(skip(state))]
async fn repair_course_occupancy(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> Result<Json<OccupancyRepair>, ApiError> {
    let course_id = CourseId::new(&course_id)?;
    let outcome = state.reconciler.repair_course_occupancy(&course_id).await?;
    Ok(Json(outcome))
}

/// POST /reconcile
#[instrument(skip(state))]
async fn reconcile(State(state): State<AppState>) -> Result<Json<ReconcileReport>, ApiError> {
    let report = state.reconciler.reconcile_pending().await?;
    Ok(Json(report))
}

/// GET /students/{student_id}
async fn list_by_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<EnrollmentView>>, ApiError> {
    let student_id = StudentId::new(&student_id)?;
    let views = query_handlers::list_by_student(&student_id, &*state.repository).await?;
    Ok(Json(views))
}

/// GET /students/{student_id}/active-count
async fn active_count_by_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<CountResponse>, ApiError> {
    let student_id = StudentId::new(&student_id)?;
    let count = query_handlers::active_count_by_student(&student_id, &*state.repository).await?;
    Ok(Json(CountResponse { count }))
}

/// GET /students/{student_id}/average-grade
async fn average_grade(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<AverageGradeResponse>, ApiError> {
    let student = StudentId::new(&student_id)?;
    let average_grade = query_handlers::average_grade(&student, &*state.repository).await?;
    Ok(Json(AverageGradeResponse {
        student_id: student.into(),
        average_grade,
    }))
}

/// GET /students/{student_id}/courses/{course_id}/grade
async fn student_grade(
    State(state): State<AppState>,
    Path((student_id, course_id)): Path<(String, String)>,
) -> Result<Json<StudentGradeResponse>, ApiError> {
    let student = StudentId::new(&student_id)?;
    let course = CourseId::new(&course_id)?;
    let grade = query_handlers::student_grade(&student, &course, &*state.repository).await?;
    Ok(Json(StudentGradeResponse {
        student_id: student.into(),
        course_id: course.into(),
        grade,
    }))
}

/// GET /students/{student_id}/courses/{course_id}/enrolled
async fn is_student_enrolled(
    State(state): State<AppState>,
    Path((student_id, course_id)): Path<(String, String)>,
) -> Result<Json<EnrolledResponse>, ApiError> {
    let enrolled =
        query_handlers::is_student_enrolled(&student_id, &course_id, &*state.repository).await?;
    Ok(Json(EnrolledResponse {
        student_id,
        course_id,
        enrolled,
    }))
}

/// Returns the router for the enrollment context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(enroll).get(list_enrollments))
        .route("/withdraw", post(withdraw))
        .route("/count", get(total_enrollments))
        .route("/reconcile", post(reconcile))
        .route("/{id}", get(get_enrollment).delete(delete_enrollment))
        .route("/{id}/grade", put(update_grade))
        .route("/{id}/status", put(update_status))
        .route("/status/{status}", get(list_by_status))
        .route("/courses/{course_id}", get(list_by_course))
        .route("/courses/{course_id}/roster", get(course_roster))
        .route("/courses/{course_id}/grades", put(batch_update_grades))
        .route("/courses/{course_id}/active-count", get(active_count_by_course))
        .route("/courses/{course_id}/occupancy", get(course_occupancy))
        .route("/courses/{course_id}/repair", post(repair_course_occupancy))
        .route("/students/{student_id}", get(list_by_student))
        .route("/students/{student_id}/active-count", get(active_count_by_student))
        .route("/students/{student_id}/average-grade", get(average_grade))
        .route(
            "/students/{student_id}/courses/{course_id}/grade",
            get(student_grade),
        )
        .route(
            "/students/{student_id}/courses/{course_id}/enrolled",
            get(is_student_enrolled),
        )
}
