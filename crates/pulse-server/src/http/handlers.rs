//! 메트릭 API 핸들러.
//!
//! JSON 본문은 미들웨어가 압축 해제/복호화/서명 검증을 마친 평문이다.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::Json;
use pulse_core::error::CoreError;
use pulse_core::models::metric::{Metric, MetricType};
use serde::Deserialize;
use std::fmt::Write;
use std::str::FromStr;

use super::AppState;
use crate::error::ApiError;

/// `POST /value/` 조회 요청
#[derive(Debug, Deserialize)]
pub struct ValueQuery {
    /// 메트릭 이름
    #[serde(rename = "id")]
    pub name: String,
    /// 메트릭 종류
    #[serde(rename = "type")]
    pub mtype: MetricType,
}

/// `POST /update/`: 단건 병합
pub async fn update(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    let metric: Metric = serde_json::from_slice(&body).map_err(CoreError::from)?;
    let merged = state.service.update(metric).await?;
    Ok(Json(merged))
}

/// `POST /updates/`: 배치 병합
pub async fn update_many(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<Metric>>, ApiError> {
    let batch: Vec<Metric> =
        serde_json::from_slice(&body).map_err(CoreError::from)?;
    let merged = state.service.update_many(batch).await?;
    Ok(Json(merged))
}

/// `POST /update/{mtype}/{name}/{value}`: URL 경로 업데이트
pub async fn update_from_path(
    State(state): State<AppState>,
    Path((mtype, name, value)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if name.is_empty() {
        return Err(ApiError::NotFound("메트릭 이름 없음".to_string()));
    }
    let metric = Metric::parse(&mtype, &name, &value)?;
    let merged = state.service.update(metric).await?;
    Ok(plain_text(merged.value_string()))
}

/// `POST /value/`: JSON 조회
pub async fn value(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Metric>, ApiError> {
    let query: ValueQuery =
        serde_json::from_slice(&body).map_err(CoreError::from)?;
    let metric = state.service.get(query.mtype, &query.name).await?;
    Ok(Json(metric))
}

/// `GET /value/{mtype}/{name}`: 평문 값 조회
pub async fn value_from_path(
    State(state): State<AppState>,
    Path((mtype, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mtype = MetricType::from_str(&mtype)?;
    let metric = state.service.get(mtype, &name).await?;
    Ok(plain_text(metric.value_string()))
}

/// `GET /ping`: 영구 저장소 도달 가능 여부
pub async fn ping(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.service.ping().await?;
    Ok(plain_text("OK".to_string()))
}

/// `GET /`: 전체 메트릭 HTML 목록
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let metrics = state.service.list().await?;
    Ok(Html(render_index(&metrics)))
}

fn plain_text(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

fn render_index(metrics: &[Metric]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>PULSE</title></head><body>\n<table>\n<tr><th>name</th><th>type</th><th>value</th></tr>\n",
    );
    for metric in metrics {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&metric.name),
            metric.mtype,
            metric.value_string()
        );
    }
    html.push_str("</table>\n</body></html>\n");
    html
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_escapes_names() {
        let html = render_index(&[Metric::gauge("<script>", 1.5), Metric::counter("hits", 3)]);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<td>1.5</td>"));
        assert!(html.contains("<td>counter</td><td>3</td>"));
    }

    #[test]
    fn value_query_uses_wire_names() {
        let query: ValueQuery = serde_json::from_str(r#"{"id":"cpu","type":"gauge"}"#).unwrap();
        assert_eq!(query.name, "cpu");
        assert_eq!(query.mtype, MetricType::Gauge);
    }
}
