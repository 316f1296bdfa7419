//! UI Components
//!
//! Board, columns, cards and the overlays around them.

mod board;
mod board_column;
mod close_reason_modal;
mod column_menu;
mod opportunity_card;
mod toast_list;

pub use board::PipelineBoard;
pub use board_column::BoardColumn;
pub use close_reason_modal::CloseReasonModal;
pub use column_menu::ColumnMenu;
pub use opportunity_card::OpportunityCard;
pub use toast_list::ToastList;
