pub mod health;
pub mod tasks;
pub mod timetabling;
