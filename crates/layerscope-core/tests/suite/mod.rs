// Aggregates all former standalone integration tests as modules.
mod end_to_end;
mod synthetic_run;
