pub mod dedup;
pub mod helpdesk_api;
pub mod secrets;
pub mod ticket_request;
pub mod ticket_response;
