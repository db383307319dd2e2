use serde_json::{Value, json};

/// OpenAPI 3 document for the projects API, served at `/swagger.json`.
pub fn openapi() -> Value {
    json!({
        "openapi": "3.0.0",
        "info": {
            "title": "Backend API",
            "version": "1.0.0",
            "description": "Project board backend API"
        },
        "paths": {
            "/api/projects": {
                "get": {
                    "summary": "List all projects",
                    "responses": {
                        "200": {
                            "description": "List of projects",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Project" }
                                    }
                                }
                            }
                        }
                    }
                },
                "post": {
                    "summary": "Create a new project",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/ProjectInput" }
                            }
                        }
                    },
                    "responses": {
                        "201": {
                            "description": "Created project",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Project" }
                                }
                            }
                        },
                        "400": { "description": "Invalid request body" }
                    }
                }
            },
            "/api/projects/{id}": {
                "get": {
                    "summary": "Get a project by id",
                    "parameters": [{
                        "name": "id",
                        "in": "path",
                        "required": true,
                        "schema": { "type": "integer" }
                    }],
                    "responses": {
                        "200": {
                            "description": "Project found",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Project" }
                                }
                            }
                        },
                        "404": { "description": "Project not found" }
                    }
                },
                "put": {
                    "summary": "Update a project",
                    "parameters": [{
                        "name": "id",
                        "in": "path",
                        "required": true,
                        "schema": { "type": "integer" }
                    }],
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/ProjectInput" }
                            }
                        }
                    },
                    "responses": {
                        "200": { "description": "Updated project" },
                        "404": { "description": "Project not found" }
                    }
                },
                "delete": {
                    "summary": "Delete a project",
                    "parameters": [{
                        "name": "id",
                        "in": "path",
                        "required": true,
                        "schema": { "type": "integer" }
                    }],
                    "responses": {
                        "200": { "description": "Deleted successfully" },
                        "404": { "description": "Project not found" }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Project": {
                    "type": "object",
                    "properties": {
                        "Id": { "type": "integer" },
                        "Name": { "type": "string" }
                    }
                },
                "ProjectInput": {
                    "type": "object",
                    "required": ["Name"],
                    "properties": {
                        "Name": { "type": "string" }
                    }
                }
            }
        }
    })
}
