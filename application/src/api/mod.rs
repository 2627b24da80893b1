//! REST API definitions.

pub mod booking;
pub mod listing;
pub mod payment;

use crate::define_error;

define_error! {
    enum QueryError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Requested entity does not exist"]
        NotFound,
    }
}

define_error! {
    enum PaginationError {
        #[code = "AMBIGUOUS_PAGINATION_ARGUMENTS"]
        #[status = BAD_REQUEST]
        #[message = "Ambiguous pagination arguments"]
        Ambiguous,
    }
}
