//! Endpoint methods for the dormitory API.
//!
//! Each method is a fixed-shape call over `HttpClient::get`/`post`/`put`/
//! `delete` with a literal path. Payloads the caller supplies are forwarded
//! as-is; the server's answer comes back as an untyped JSON value. Optional
//! filters are dropped from the query here when absent, and a building id of
//! 0 counts as absent.

use serde::Serialize;
use serde_json::{json, Value};

use crate::client::{HttpClient, RequestOptions};
use crate::download::filename_from_content_disposition;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::multipart::{FilePart, MultipartForm};
use crate::types::{
    ChangeBedRequest, ChangePasswordRequest, ExportedFile, LoginRequest, ResetPasswordRequest,
    SelectBedRequest,
};

fn page_params(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("per_page", per_page.to_string())]
}

fn search_params(page: u32, per_page: u32, search: &str) -> Vec<(&'static str, String)> {
    let mut params = page_params(page, per_page);
    params.push(("search", search.to_string()));
    params
}

impl HttpClient {
    // --- auth ---

    /// Log in and, when the server hands out a token, persist it together
    /// with the returned user record. Returns the server payload unchanged.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Value, ApiError> {
        let response = self.post("/api/auth/login", &LoginRequest { username, password })?;
        if let Some(token) = response.get("access_token").and_then(Value::as_str) {
            self.set_token(token)?;
            let user = response.get("user").cloned().unwrap_or(Value::Null);
            self.session().set_user(&user)?;
            tracing::info!(username, "logged in");
        }
        Ok(response)
    }

    pub fn register<T: Serialize + ?Sized>(&mut self, user: &T) -> Result<Value, ApiError> {
        self.post("/api/auth/register", user)
    }

    pub fn get_profile(&mut self) -> Result<Value, ApiError> {
        self.get("/api/auth/profile", &[])
    }

    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<Value, ApiError> {
        self.post(
            "/api/auth/change-password",
            &ChangePasswordRequest {
                old_password,
                new_password,
            },
        )
    }

    // --- admin: users ---

    pub fn get_users(&mut self, page: u32, per_page: u32, search: &str) -> Result<Value, ApiError> {
        self.get("/api/admin/users", &search_params(page, per_page, search))
    }

    pub fn create_user<T: Serialize + ?Sized>(&mut self, user: &T) -> Result<Value, ApiError> {
        self.post("/api/admin/users", user)
    }

    pub fn delete_user(&mut self, user_id: i64) -> Result<Value, ApiError> {
        self.delete(&format!("/api/admin/users/{user_id}"))
    }

    pub fn reset_user_password(&mut self, user_id: i64, new_password: &str) -> Result<Value, ApiError> {
        self.put(
            &format!("/api/admin/users/{user_id}/password"),
            &ResetPasswordRequest { new_password },
        )
    }

    pub fn import_users(&mut self, file: FilePart) -> Result<Value, ApiError> {
        self.upload("/api/admin/users/import", file)
    }

    // --- admin: buildings and rooms ---

    pub fn get_buildings(&mut self) -> Result<Value, ApiError> {
        self.get("/api/admin/buildings", &[])
    }

    pub fn create_building<T: Serialize + ?Sized>(&mut self, building: &T) -> Result<Value, ApiError> {
        self.post("/api/admin/buildings", building)
    }

    pub fn delete_building(&mut self, building_id: i64) -> Result<Value, ApiError> {
        self.delete(&format!("/api/admin/buildings/{building_id}"))
    }

    pub fn get_rooms(&mut self, building_id: Option<i64>, room_type: Option<&str>) -> Result<Value, ApiError> {
        let mut params = Vec::new();
        if let Some(id) = building_id.filter(|&id| id != 0) {
            params.push(("building_id", id.to_string()));
        }
        if let Some(kind) = room_type.filter(|k| !k.is_empty()) {
            params.push(("room_type", kind.to_string()));
        }
        self.get("/api/admin/rooms", &params)
    }

    pub fn create_room<T: Serialize + ?Sized>(&mut self, room: &T) -> Result<Value, ApiError> {
        self.post("/api/admin/rooms", room)
    }

    pub fn update_room<T: Serialize + ?Sized>(&mut self, room_id: i64, room: &T) -> Result<Value, ApiError> {
        self.put(&format!("/api/admin/rooms/{room_id}"), room)
    }

    pub fn delete_room(&mut self, room_id: i64) -> Result<Value, ApiError> {
        self.delete(&format!("/api/admin/rooms/{room_id}"))
    }

    pub fn import_rooms(&mut self, file: FilePart) -> Result<Value, ApiError> {
        self.upload("/api/admin/rooms/import", file)
    }

    // --- admin: allocations ---

    pub fn get_allocations(&mut self, page: u32, per_page: u32) -> Result<Value, ApiError> {
        self.get("/api/admin/allocations", &page_params(page, per_page))
    }

    pub fn create_allocation<T: Serialize + ?Sized>(&mut self, allocation: &T) -> Result<Value, ApiError> {
        self.post("/api/admin/allocations", allocation)
    }

    pub fn update_allocation<T: Serialize + ?Sized>(
        &mut self,
        allocation_id: i64,
        data: &T,
    ) -> Result<Value, ApiError> {
        self.put(&format!("/api/admin/allocations/{allocation_id}"), data)
    }

    pub fn delete_allocation(&mut self, allocation_id: i64) -> Result<Value, ApiError> {
        self.delete(&format!("/api/admin/allocations/{allocation_id}"))
    }

    pub fn get_unallocated_users(&mut self, page: u32, per_page: u32, search: &str) -> Result<Value, ApiError> {
        self.get("/api/admin/unallocated-users", &search_params(page, per_page, search))
    }

    pub fn get_allocation_history(&mut self, page: u32, per_page: u32) -> Result<Value, ApiError> {
        self.get("/api/admin/allocation-history", &page_params(page, per_page))
    }

    pub fn get_room_type_allocations(&mut self, page: u32, per_page: u32, search: &str) -> Result<Value, ApiError> {
        self.get(
            "/api/admin/room-type-allocations",
            &search_params(page, per_page, search),
        )
    }

    pub fn create_room_type_allocation<T: Serialize + ?Sized>(
        &mut self,
        allocation: &T,
    ) -> Result<Value, ApiError> {
        self.post("/api/admin/room-type-allocations", allocation)
    }

    pub fn update_room_type_allocation<T: Serialize + ?Sized>(
        &mut self,
        allocation_id: i64,
        data: &T,
    ) -> Result<Value, ApiError> {
        self.put(&format!("/api/admin/room-type-allocations/{allocation_id}"), data)
    }

    pub fn delete_room_type_allocation(&mut self, allocation_id: i64) -> Result<Value, ApiError> {
        self.delete(&format!("/api/admin/room-type-allocations/{allocation_id}"))
    }

    pub fn get_unallocated_room_type_users(
        &mut self,
        page: u32,
        per_page: u32,
        search: &str,
    ) -> Result<Value, ApiError> {
        self.get(
            "/api/admin/unallocated-room-type-users",
            &search_params(page, per_page, search),
        )
    }

    // --- admin: lottery ---

    pub fn quick_lottery_draw<T: Serialize + ?Sized>(&mut self, draw: &T) -> Result<Value, ApiError> {
        self.post("/api/admin/lottery/quick-draw", draw)
    }

    pub fn publish_lottery_results(&mut self, lottery_id: i64) -> Result<Value, ApiError> {
        self.post(&format!("/api/admin/lottery/{lottery_id}/publish"), &json!({}))
    }

    pub fn delete_lottery_results(&mut self, lottery_id: i64) -> Result<Value, ApiError> {
        self.delete(&format!("/api/admin/lottery/{lottery_id}"))
    }

    pub fn get_all_lottery_results(
        &mut self,
        page: u32,
        per_page: u32,
        lottery_id: Option<i64>,
    ) -> Result<Value, ApiError> {
        let mut params = page_params(page, per_page);
        if let Some(id) = lottery_id {
            params.push(("lottery_id", id.to_string()));
        }
        self.get("/api/admin/lottery/results", &params)
    }

    pub fn update_lottery_result<T: Serialize + ?Sized>(&mut self, result_id: i64, data: &T) -> Result<Value, ApiError> {
        self.put(&format!("/api/admin/lottery/results/{result_id}"), data)
    }

    // --- lottery ---

    pub fn get_lottery_settings(&mut self) -> Result<Value, ApiError> {
        self.get("/api/lottery/settings", &[])
    }

    pub fn create_lottery_setting<T: Serialize + ?Sized>(&mut self, setting: &T) -> Result<Value, ApiError> {
        self.post("/api/lottery/settings", setting)
    }

    /// Publish a lottery; `room_counts` maps room types to how many rooms
    /// are offered.
    pub fn publish_lottery<T: Serialize + ?Sized>(&mut self, setting_id: i64, room_counts: &T) -> Result<Value, ApiError> {
        self.post(&format!("/api/lottery/settings/{setting_id}/publish"), room_counts)
    }

    pub fn get_lottery_results(&mut self, lottery_id: Option<i64>) -> Result<Value, ApiError> {
        let params: Vec<_> = lottery_id
            .map(|id| ("lottery_id", id.to_string()))
            .into_iter()
            .collect();
        self.get("/api/lottery/results", &params)
    }

    pub fn get_available_rooms(&mut self, room_type: Option<&str>, building_id: Option<i64>) -> Result<Value, ApiError> {
        let mut params = Vec::new();
        if let Some(kind) = room_type.filter(|k| !k.is_empty()) {
            params.push(("room_type", kind.to_string()));
        }
        if let Some(id) = building_id.filter(|&id| id != 0) {
            params.push(("building_id", id.to_string()));
        }
        self.get("/api/lottery/rooms/available", &params)
    }

    pub fn get_buildings_for_selection(&mut self) -> Result<Value, ApiError> {
        self.get("/api/lottery/buildings", &[])
    }

    pub fn get_my_selection(&mut self) -> Result<Value, ApiError> {
        self.get("/api/lottery/my-selection", &[])
    }

    // --- room selection ---

    pub fn select_room(&mut self, bed_id: i64) -> Result<Value, ApiError> {
        self.post("/api/room-selection/select", &SelectBedRequest { bed_id })
    }

    pub fn cancel_selection(&mut self) -> Result<Value, ApiError> {
        self.post("/api/room-selection/cancel", &json!({}))
    }

    pub fn confirm_selection(&mut self) -> Result<Value, ApiError> {
        self.post("/api/room-selection/confirm", &json!({}))
    }

    pub fn change_selection(&mut self, new_bed_id: i64) -> Result<Value, ApiError> {
        self.post("/api/room-selection/change", &ChangeBedRequest { new_bed_id })
    }

    pub fn get_selection_statistics(&mut self) -> Result<Value, ApiError> {
        self.get("/api/room-selection/statistics", &[])
    }

    // --- statistics ---

    pub fn get_detailed_statistics(&mut self) -> Result<Value, ApiError> {
        self.get("/api/admin/detailed-statistics", &[])
    }

    /// Download the allocation spreadsheet and hand it to the host.
    ///
    /// The filename comes from `Content-Disposition`, or the configured
    /// default when the header is missing or carries no usable name.
    pub fn export_allocations(&mut self) -> Result<ExportedFile, ApiError> {
        let response = self.send_with_label(
            HttpMethod::Get,
            "/api/admin/export-allocations",
            RequestOptions::new(),
            "export failed",
        )?;

        let filename = response
            .header("Content-Disposition")
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| self.config().export_filename.clone());

        self.host().save_file(&filename, &response.body)?;
        tracing::info!(filename = %filename, size = response.body.len(), "exported allocations");
        Ok(ExportedFile {
            filename,
            size: response.body.len(),
        })
    }

    /// POST `file` as the single `file` field of a multipart form.
    fn upload(&mut self, path: &str, file: FilePart) -> Result<Value, ApiError> {
        let body = MultipartForm::new().file("file", file).into_body()?;
        self.request(HttpMethod::Post, path, RequestOptions::new().body(body))
    }
}
