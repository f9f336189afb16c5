//! Per-screen resource descriptions consumed by the generic gateway and
//! list controller.

use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use shared::domain::{
    BlogPayload, BlogPost, Category, CategoryPayload, Contact, Entity, Event, EventPayload,
    GalleryImage, GalleryImagePayload, NoPayload, TeamMember, TeamMemberPayload, Validate,
    Volunteer, VolunteerPayload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    Put,
    Patch,
}

/// Category picker source: active categories only.
pub const ACTIVE_CATEGORIES_PATH: &str = "/admin/category/getAllActiveCategories";

/// Path templates for one resource. `{id}` is replaced with the entity id.
/// A `None` route means the backend does not offer that operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoutes {
    pub list: String,
    pub get: Option<String>,
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
    pub status: Option<String>,
    pub update_method: UpdateMethod,
}

impl ResourceRoutes {
    /// Canonical REST layout: `GET/POST /base`, `GET/PUT/DELETE /base/{id}`.
    pub fn rest(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let item = format!("{base}/{{id}}");
        Self {
            list: base.to_string(),
            get: Some(item.clone()),
            create: Some(base.to_string()),
            update: Some(item.clone()),
            delete: Some(item),
            status: None,
            update_method: UpdateMethod::Put,
        }
    }

    pub fn with_status(mut self, template: impl Into<String>) -> Self {
        self.status = Some(template.into());
        self
    }

    pub fn fill(template: &str, id: &str) -> String {
        template.replace("{id}", id)
    }
}

fn admin_routes(
    list: &str,
    get: Option<&str>,
    create: Option<&str>,
    update: Option<&str>,
    delete: Option<&str>,
) -> ResourceRoutes {
    ResourceRoutes {
        list: list.to_string(),
        get: get.map(str::to_owned),
        create: create.map(str::to_owned),
        update: update.map(str::to_owned),
        delete: delete.map(str::to_owned),
        status: None,
        update_method: UpdateMethod::Put,
    }
}

pub trait Resource: Send + Sync + 'static {
    type Entity: Entity + DeserializeOwned + Clone + Send + Sync + fmt::Debug + 'static;
    type Payload: Validate + Serialize + Send + Sync + 'static;

    /// Singular display name used in notifications.
    const NAME: &'static str;
    /// Keys under which list endpoints return their items, besides `items`.
    const LIST_KEYS: &'static [&'static str];
    const PAGE_SIZE: u32;
    /// Filter parameters the list endpoint understands.
    const FILTER_KEYS: &'static [&'static str] = &[];
    /// Boolean field flipped by a status toggle.
    const STATUS_FIELD: Option<&'static str> = None;

    fn routes() -> ResourceRoutes;
}

pub struct Blogs;

impl Resource for Blogs {
    type Entity = BlogPost;
    type Payload = BlogPayload;

    const NAME: &'static str = "Blog post";
    const LIST_KEYS: &'static [&'static str] = &["blogs"];
    const PAGE_SIZE: u32 = 6;
    const FILTER_KEYS: &'static [&'static str] = &["category"];
    const STATUS_FIELD: Option<&'static str> = Some("isActive");

    fn routes() -> ResourceRoutes {
        admin_routes(
            "/admin/blog/getAllBlogs",
            Some("/admin/blog/getBlogDetails/{id}"),
            Some("/admin/blog/createBlog"),
            Some("/admin/blog/updateBlog/{id}"),
            Some("/admin/blog/deleteBlog/{id}"),
        )
    }
}

pub struct Volunteers;

impl Resource for Volunteers {
    type Entity = Volunteer;
    type Payload = VolunteerPayload;

    const NAME: &'static str = "Volunteer";
    const LIST_KEYS: &'static [&'static str] = &["volunteers"];
    const PAGE_SIZE: u32 = 10;
    const STATUS_FIELD: Option<&'static str> = Some("isActive");

    fn routes() -> ResourceRoutes {
        admin_routes(
            "/admin/volunteer/getAllVolunteers",
            Some("/admin/volunteer/getVolunteerDetails/{id}"),
            Some("/admin/volunteer/createVolunteer"),
            Some("/admin/volunteer/updateVolunteer/{id}"),
            Some("/admin/volunteer/deleteVolunteer/{id}"),
        )
    }
}

pub struct TeamMembers;

impl Resource for TeamMembers {
    type Entity = TeamMember;
    type Payload = TeamMemberPayload;

    const NAME: &'static str = "Team member";
    const LIST_KEYS: &'static [&'static str] = &["teamMembers"];
    const PAGE_SIZE: u32 = 10;
    const FILTER_KEYS: &'static [&'static str] = &["memberType"];
    const STATUS_FIELD: Option<&'static str> = Some("isActive");

    fn routes() -> ResourceRoutes {
        admin_routes(
            "/admin/team/getAllTeamMembers",
            Some("/admin/team/getTeamMemberDetails/{id}"),
            Some("/admin/team/createTeamMember"),
            Some("/admin/team/updateTeamMember/{id}"),
            Some("/admin/team/deleteTeamMember/{id}"),
        )
    }
}

pub struct Events;

impl Resource for Events {
    type Entity = Event;
    type Payload = EventPayload;

    const NAME: &'static str = "Event";
    const LIST_KEYS: &'static [&'static str] = &["events"];
    const PAGE_SIZE: u32 = 6;
    const FILTER_KEYS: &'static [&'static str] = &["category"];
    const STATUS_FIELD: Option<&'static str> = Some("isActive");

    fn routes() -> ResourceRoutes {
        admin_routes(
            "/admin/event/getAllEvents",
            Some("/admin/event/getEventDetails/{id}"),
            Some("/admin/event/createEvent"),
            Some("/admin/event/updateEvent/{id}"),
            Some("/admin/event/deleteEvent/{id}"),
        )
    }
}

pub struct Gallery;

impl Resource for Gallery {
    type Entity = GalleryImage;
    type Payload = GalleryImagePayload;

    const NAME: &'static str = "Gallery image";
    const LIST_KEYS: &'static [&'static str] = &["galleryImages", "images"];
    const PAGE_SIZE: u32 = 8;

    fn routes() -> ResourceRoutes {
        let mut routes = admin_routes(
            "/admin/gallery/getGalleryImages",
            None,
            Some("/admin/gallery/addImageToGallery"),
            Some("/admin/gallery/updateGallery/{id}"),
            Some("/admin/gallery/deleteImageFromGallery/{id}"),
        );
        routes.update_method = UpdateMethod::Patch;
        routes
    }
}

pub struct Categories;

impl Resource for Categories {
    type Entity = Category;
    type Payload = CategoryPayload;

    const NAME: &'static str = "Category";
    const LIST_KEYS: &'static [&'static str] = &["categories"];
    const PAGE_SIZE: u32 = 10;
    const STATUS_FIELD: Option<&'static str> = Some("isActive");

    fn routes() -> ResourceRoutes {
        admin_routes(
            "/admin/category/getAllCategories",
            Some("/admin/category/getCategoryDetails/{id}"),
            Some("/admin/category/createCategory"),
            Some("/admin/category/updateCategory/{id}"),
            Some("/admin/category/deleteCategory/{id}"),
        )
    }
}

pub struct Contacts;

impl Resource for Contacts {
    type Entity = Contact;
    type Payload = NoPayload;

    const NAME: &'static str = "Contact";
    const LIST_KEYS: &'static [&'static str] = &["contacts"];
    const PAGE_SIZE: u32 = 10;
    const FILTER_KEYS: &'static [&'static str] = &["isContacted"];
    const STATUS_FIELD: Option<&'static str> = Some("isContacted");

    fn routes() -> ResourceRoutes {
        admin_routes(
            "/admin/contact/getAllContacts",
            None,
            None,
            None,
            Some("/admin/contact/deleteContact/{id}"),
        )
        .with_status("/admin/contact/updateStatus/{id}")
    }
}
