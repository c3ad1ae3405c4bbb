use std::sync::Arc;

use crate::application::comments::CommentsService;
use crate::application::gateways::Authenticator;
use crate::application::guestbook::GuestbookService;

#[derive(Clone)]
pub struct ApiState {
    pub guestbook: Arc<GuestbookService>,
    pub comments: Arc<CommentsService>,
    pub authenticator: Arc<dyn Authenticator>,
}
