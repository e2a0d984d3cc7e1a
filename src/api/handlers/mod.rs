mod accounts;
mod files;
mod static_files;
mod system;

pub use accounts::{list_modules, list_teachers, module_login, teacher_login, update_password};
pub use files::{
    delete_file, delete_file_by_id, get_registry, list_bucket, list_files, teacher_files,
    update_file, update_filename, upload_file, UploadResponse,
};
pub use static_files::serve_upload;
pub use system::{health, index};
